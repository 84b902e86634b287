//! Deterministic booking replies that bypass retrieval and generation.

use chrono::{DateTime, Local};

/// Phrases that mark a booking request.
pub const BOOKING_PHRASES: &[&str] = &["预约", "试听", "报名", "约课"];

/// Length of a booking number.
pub const BOOKING_NUMBER_LEN: usize = 10;

/// Whether the prompt asks to book a session.
#[must_use]
pub fn is_booking_intent(prompt: &str) -> bool {
    let prompt = prompt.to_lowercase();
    BOOKING_PHRASES.iter().any(|phrase| prompt.contains(phrase))
}

/// A fresh uppercase alphanumeric booking number.
#[must_use]
pub fn booking_number() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(BOOKING_NUMBER_LEN)
        .collect::<String>()
        .to_uppercase()
}

/// Render the booking confirmation for a booking number and creation time.
#[must_use]
pub fn booking_reply(booking_number: &str, created_at: DateTime<Local>) -> String {
    let created_at = created_at.format("%Y-%m-%d %H:%M");
    format!(
        "已为你创建预约请求，预约编号：{booking_number}

【
### 预约成功 ✅
- 预约编号：`{booking_number}`
- 创建时间：{created_at}
- 下一步：请补充你的**意向课程**、**上课方式（线上/线下）**、**可联系时间段**（可选：手机号），我会继续为你确认安排。
】
"
    )
}

/// The booking reply for `prompt`, or `None` when it is not a booking request.
#[must_use]
pub fn try_intent_shortcut(prompt: &str) -> Option<String> {
    if !is_booking_intent(prompt) {
        return None;
    }
    let number = booking_number();
    tracing::info!(booking_number = %number, "Booking intent recognized");
    Some(booking_reply(&number, Local::now()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_booking_phrases_match() {
        assert!(is_booking_intent("我想预约一节课"));
        assert!(is_booking_intent("怎么报名"));
        assert!(is_booking_intent("可以试听吗"));
        assert!(is_booking_intent("帮我约课"));
        assert!(!is_booking_intent("Java 课程有哪些内容"));
        assert!(!is_booking_intent(""));
    }

    #[test]
    fn test_booking_number_format() {
        let number = booking_number();
        assert_eq!(number.len(), BOOKING_NUMBER_LEN);
        assert!(number
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(number, booking_number());
    }

    #[test]
    fn test_booking_reply_contents() {
        let created = Local.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let reply = booking_reply("ABCDEF1234", created);

        assert!(reply.starts_with("已为你创建预约请求，预约编号：ABCDEF1234"));
        assert!(reply.contains("`ABCDEF1234`"));
        assert!(reply.contains("2026-03-01 09:30"));
    }

    #[test]
    fn test_shortcut_only_for_booking() {
        assert!(try_intent_shortcut("退款怎么处理").is_none());
        let reply = try_intent_shortcut("我要预约").unwrap();
        assert!(reply.contains("预约编号"));
    }
}
