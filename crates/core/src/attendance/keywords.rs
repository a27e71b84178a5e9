//! Keyword-to-action detection
//!
//! Maps free-text chat messages to a time clock action by case-insensitive
//! substring matching against a fixed keyword table. Table order is
//! precedence order: the first action with a matching keyword wins.

use dakoku_domain::ClockType;

/// Keyword table. The `freee`-prefixed and `f`-prefixed spellings exist so
/// the bot can coexist with other attendance bots in the same channel.
pub const KEYWORDS: &[(ClockType, &[&str])] = &[
    (
        ClockType::ClockIn,
        &[
            "freee出勤",
            "freee始業",
            "f出勤",
            "f始業",
            "出勤",
            "始業",
            "しゅっきん",
            "しぎょう",
            "おはようございます",
            "in",
        ],
    ),
    (
        ClockType::ClockOut,
        &[
            "freee退勤",
            "freee終業",
            "f退勤",
            "f終業",
            "退勤",
            "終業",
            "たいきん",
            "しゅうぎょう",
            "お疲れ様",
            "out",
        ],
    ),
    (
        ClockType::BreakBegin,
        &[
            "freee休憩入り",
            "f休憩入り",
            "休憩入り",
            "休憩開始",
            "きゅうけいいり",
            "きゅうけいかいし",
        ],
    ),
    (
        ClockType::BreakEnd,
        &[
            "freee休憩戻り",
            "f休憩戻り",
            "休憩戻り",
            "休憩終了",
            "きゅうけいもどり",
            "きゅうけいしゅうりょう",
        ],
    ),
];

/// Detect the attendance action expressed by a chat message.
///
/// Returns `None` when no keyword matches; ordinary conversation must not
/// trigger a clock event.
#[must_use]
pub fn detect_action(text: &str) -> Option<ClockType> {
    let message = text.trim().to_lowercase();
    if message.is_empty() {
        return None;
    }

    for (action, keywords) in KEYWORDS {
        for keyword in *keywords {
            if message.contains(&keyword.to_lowercase()) {
                return Some(*action);
            }
        }
    }

    None
}
