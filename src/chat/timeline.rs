//! Derived, render-time views over a conversation: sender alignment and
//! calendar-day grouping. Nothing here is stored.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

use crate::api::models::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Outgoing,
    Incoming,
}

pub fn alignment(message: &Message, current_user_id: &str) -> Alignment {
    if message.is_from(current_user_id) {
        Alignment::Outgoing
    } else {
        Alignment::Incoming
    }
}

/// Messages created on one calendar date in the viewer's time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup<'a> {
    pub date: NaiveDate,
    pub messages: Vec<&'a Message>,
}

pub fn local_date<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// Partition by calendar date. Groups appear in order of their first
/// message; messages keep their relative order inside a group.
pub fn group_by_day<'a, Tz: TimeZone>(messages: &'a [Message], tz: &Tz) -> Vec<DayGroup<'a>> {
    let mut groups: Vec<DayGroup<'a>> = Vec::new();
    for message in messages {
        let date = local_date(&message.created_at, tz);
        match groups.iter_mut().find(|g| g.date == date) {
            Some(group) => group.messages.push(message),
            None => groups.push(DayGroup { date, messages: vec![message] }),
        }
    }
    groups
}

pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.checked_sub_days(Days::new(1)) == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %-d %B %Y").to_string()
    }
}

pub fn format_time<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(ts: &str, text: &str) -> Message {
        Message {
            created_at: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            ..Message::optimistic("d1", "u1", text)
        }
    }

    #[test]
    fn two_dates_make_two_groups_in_order() {
        let msgs = vec![at("2024-01-01T10:00:00Z", "a"), at("2024-01-02T08:00:00Z", "b")];
        let groups = group_by_day(&msgs, &Utc);
        let dates: Vec<_> = groups.iter().map(|g| g.date.to_string()).collect();
        assert_eq!(dates, ["2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn calendar_date_not_24h_window() {
        // 23:59 and 00:01 are two minutes apart but on different dates.
        let msgs = vec![
            at("2024-03-10T23:59:00Z", "late"),
            at("2024-03-11T00:01:00Z", "early"),
            at("2024-03-11T22:00:00Z", "evening"),
        ];
        let groups = group_by_day(&msgs, &Utc);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].messages.len(), 2);
    }

    #[test]
    fn same_date_shares_group_even_when_interleaved() {
        let msgs = vec![
            at("2024-01-01T10:00:00Z", "a"),
            at("2024-01-02T10:00:00Z", "b"),
            at("2024-01-01T11:00:00Z", "c"),
        ];
        let groups = group_by_day(&msgs, &Utc);
        assert_eq!(groups.len(), 2);
        let first: Vec<_> = groups[0].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(first, ["a", "c"]);
    }

    #[test]
    fn grouping_follows_viewer_time_zone() {
        let msgs = vec![at("2024-01-01T23:30:00Z", "a"), at("2024-01-01T21:00:00Z", "b")];
        let paris = FixedOffset::east_opt(3600).unwrap();
        let groups = group_by_day(&msgs, &paris);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date.to_string(), "2024-01-02");
        assert_eq!(format_time(&msgs[0].created_at, &paris), "00:30");
    }

    #[test]
    fn labels_relative_to_today() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(day_label(today, today), "Today");
        assert_eq!(day_label(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), today), "Yesterday");
        assert_eq!(
            day_label(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), today),
            "Monday, 1 January 2024"
        );
    }

    #[test]
    fn alignment_depends_on_sender_only() {
        let mine = Message::optimistic("u1", "d1", "x");
        let theirs = Message::optimistic("d1", "u1", "y");
        assert_eq!(alignment(&mine, "u1"), Alignment::Outgoing);
        assert_eq!(alignment(&theirs, "u1"), Alignment::Incoming);
    }
}
