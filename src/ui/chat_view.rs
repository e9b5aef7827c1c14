use chrono::{NaiveDate, TimeZone};

use crate::api::models::Message;
use crate::chat::timeline::{self, Alignment};
use crate::chat::view::ViewState;

pub const THREAD_WIDTH: usize = 64;

pub fn render_header(state: &ViewState) -> String {
    match state {
        ViewState::Idle => "Messages: pick a doctor with /open <n>".to_string(),
        ViewState::Loading { partner } => format!("{} (loading...)", partner.display_name()),
        ViewState::Ready { partner } => format!("{} | {}", partner.display_name(), partner.specialty_label()),
        ViewState::Failed { partner, .. } => format!("{} (history unavailable)", partner.display_name()),
    }
}

/// Day-separated thread: our messages on the right, theirs on the left.
pub fn render_thread<Tz>(
    messages: &[Message],
    current_user_id: &str,
    today: NaiveDate,
    tz: &Tz,
    width: usize,
) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = Vec::new();
    for group in timeline::group_by_day(messages, tz) {
        let label = format!("-- {} --", timeline::day_label(group.date, today));
        out.push(format!("{:^width$}", label, width = width));
        for message in group.messages {
            let line = format!("{}  {}", message.content, timeline::format_time(&message.created_at, tz));
            match timeline::alignment(message, current_user_id) {
                Alignment::Outgoing => out.push(format!("{:>width$}", line, width = width)),
                Alignment::Incoming => out.push(line),
            }
        }
    }
    out
}
