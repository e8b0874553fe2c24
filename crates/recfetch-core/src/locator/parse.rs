//! Parsers for the line-oriented `key=value` replies of `mediaFileFind.cgi`.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::recording::{RecordingDescriptor, RecordingKind, CAMERA_TIME_FORMAT};

/// Header of a `findNextFile` page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageHeader {
    /// `found=N`.
    Found(usize),
    /// No `found=` line; the camera has nothing more to say.
    Missing,
    /// `found=` with a value that is not a count.
    Invalid,
}

/// `result=<id>` from `factory.create`.
pub(crate) fn object_id(body: &str) -> Option<String> {
    body.lines()
        .filter_map(|l| l.trim().strip_prefix("result="))
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// `findFile` answers with an `OK` line on success (case varies by firmware).
pub(crate) fn is_ok(body: &str) -> bool {
    body.lines().any(|l| l.trim().eq_ignore_ascii_case("ok"))
}

pub(crate) fn page_header(body: &str) -> PageHeader {
    let Some(first) = body.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return PageHeader::Missing;
    };
    match first.strip_prefix("found=") {
        None => PageHeader::Missing,
        Some(n) => n
            .trim()
            .parse()
            .map(PageHeader::Found)
            .unwrap_or(PageHeader::Invalid),
    }
}

/// Group `items[N].Key=Value` lines by `N` and build descriptors.
///
/// Items missing a path or with unparsable times are skipped. A missing
/// `Channel` takes `default_channel`. Page order is preserved.
pub(crate) fn records(body: &str, default_channel: u32) -> Vec<RecordingDescriptor> {
    let mut items: BTreeMap<usize, BTreeMap<&str, &str>> = BTreeMap::new();
    for line in body.lines().map(str::trim) {
        let Some(rest) = line.strip_prefix("items[") else {
            continue;
        };
        let Some((index, field)) = rest.split_once("].") else {
            continue;
        };
        let Ok(index) = index.parse::<usize>() else {
            continue;
        };
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        items.entry(index).or_default().insert(key, value.trim());
    }

    items
        .into_iter()
        .filter_map(|(index, fields)| {
            let built = descriptor(&fields, default_channel);
            if built.is_none() {
                tracing::debug!(item = index, "skipping unparsable search record");
            }
            built
        })
        .collect()
}

fn descriptor(fields: &BTreeMap<&str, &str>, default_channel: u32) -> Option<RecordingDescriptor> {
    let path = fields.get("FilePath").filter(|p| !p.is_empty())?;
    let start = NaiveDateTime::parse_from_str(fields.get("StartTime")?, CAMERA_TIME_FORMAT).ok()?;
    let end = NaiveDateTime::parse_from_str(fields.get("EndTime")?, CAMERA_TIME_FORMAT).ok()?;
    let channel = match fields.get("Channel") {
        Some(c) => c.parse().ok()?,
        None => default_channel,
    };
    let kind = RecordingKind::classify(fields.get("Type").copied(), path);
    RecordingDescriptor::new(start, end, channel, *path, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "found=3\r\n\
items[0].Channel=0\r\n\
items[0].EndTime=2024-01-01 10:05:00\r\n\
items[0].FilePath=/mnt/sd/2024-01-01/001/dav/10/10.00.00-10.05.00[R][0@0][0].mp4\r\n\
items[0].StartTime=2024-01-01 10:00:00\r\n\
items[0].Type=dav\r\n\
items[1].EndTime=2024-01-01 10:05:00\r\n\
items[1].FilePath=/mnt/sd/2024-01-01/001/jpg/10/00/00[R][0@0][0].jpg\r\n\
items[1].StartTime=2024-01-01 10:00:00\r\n\
items[1].Type=jpg\r\n\
items[2].EndTime=garbage\r\n\
items[2].FilePath=/mnt/sd/broken.mp4\r\n\
items[2].StartTime=2024-01-01 10:10:00\r\n";

    #[test]
    fn object_id_from_factory_reply() {
        assert_eq!(object_id("result=3014\r\n").as_deref(), Some("3014"));
        assert_eq!(object_id("Error\r\nBad Request!\r\n"), None);
        assert_eq!(object_id("result=\r\n"), None);
    }

    #[test]
    fn ok_is_case_insensitive() {
        assert!(is_ok("OK\r\n"));
        assert!(is_ok("ok"));
        assert!(!is_ok("Error\r\n"));
    }

    #[test]
    fn ok_must_be_a_whole_line() {
        assert!(is_ok("\r\n  Ok  \r\n"));
        assert!(!is_ok("Error\r\nInvalid token\r\n"));
        assert!(!is_ok("Error\r\nBooking failed\r\n"));
        assert!(!is_ok(""));
    }

    #[test]
    fn page_headers() {
        assert_eq!(page_header(PAGE), PageHeader::Found(3));
        assert_eq!(page_header("found=0\r\n"), PageHeader::Found(0));
        assert_eq!(page_header("\r\nfound=2"), PageHeader::Found(2));
        assert_eq!(page_header("Error\r\n"), PageHeader::Missing);
        assert_eq!(page_header(""), PageHeader::Missing);
        assert_eq!(page_header("found=lots"), PageHeader::Invalid);
    }

    #[test]
    fn records_grouped_by_item_index() {
        let got = records(PAGE, 1);
        assert_eq!(got.len(), 2, "broken item skipped");
        assert_eq!(got[0].channel, 0);
        assert!(got[0].is_video());
        assert_eq!(got[1].channel, 1, "missing Channel takes the requested one");
        assert_eq!(got[1].kind, RecordingKind::Snapshot);
    }

    #[test]
    fn field_order_does_not_matter() {
        let body = "found=1\nitems[7].StartTime=2024-01-01 09:00:00\nitems[7].FilePath=/a.mp4\nitems[7].EndTime=2024-01-01 09:05:00\n";
        let got = records(body, 2);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].remote_path, "/a.mp4");
        assert_eq!(got[0].channel, 2);
    }

    #[test]
    fn inverted_interval_is_skipped() {
        let body = "found=1\nitems[0].FilePath=/a.mp4\nitems[0].StartTime=2024-01-01 10:05:00\nitems[0].EndTime=2024-01-01 10:00:00\n";
        assert!(records(body, 1).is_empty());
    }
}
