// src/messages.rs

pub fn rejected_message(reason: &str) -> String {
    format!(
        "❌ **Request Rejected**\n\n\
        {}\n\n\
        Nothing was changed. Fix the issue above and try again.",
        reason
    )
}

pub fn failure_message() -> String {
    "⚠️ **Something Went Wrong**\n\n\
    The bot could not complete your request. Please try again later, \
    or contact an administrator if this keeps happening."
        .to_string()
}

pub fn recruiting_message(clan_name: &str, clan_tag: &str, body: &str) -> String {
    format!(
        "📣 **{} is recruiting!** (`{}`)\n\n{}\n\n\
        Press **Apply** in the applications channel to open a ticket.",
        clan_name, clan_tag, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recruiting_message_contains_tag() {
        let text = recruiting_message("Night Owls", "#2PP", "TH12+ welcome");
        assert!(text.contains("Night Owls"));
        assert!(text.contains("`#2PP`"));
        assert!(text.contains("TH12+ welcome"));
    }
}
