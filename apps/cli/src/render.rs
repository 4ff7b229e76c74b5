use chrono::{Local, TimeZone};
use fsd::{IndexReport, SearchItem, UNKNOWN_TS};

const NAME_COLUMN_CHARS: usize = 40;

pub(crate) fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{} {}", size as u64, unit);
        }
        size /= 1024.0;
    }

    format!("{:.2} TB", size)
}

pub(crate) fn format_modified(unix_secs: i64) -> String {
    if unix_secs == UNKNOWN_TS {
        return "-".to_string();
    }

    match Local.timestamp_opt(unix_secs, 0).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

pub(crate) fn truncate_middle(input: &str, max_chars: usize) -> String {
    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= max_chars {
        return input.to_string();
    }

    if max_chars <= 3 {
        return "...".to_string();
    }

    let keep = max_chars - 3;
    let left = keep / 2;
    let right = keep - left;

    let start: String = chars[..left].iter().collect();
    let end: String = chars[chars.len() - right..].iter().collect();
    format!("{}...{}", start, end)
}

pub(crate) fn result_rows(items: &[SearchItem]) -> Vec<String> {
    if items.is_empty() {
        return vec!["No files found".to_string()];
    }

    let mut rows = Vec::with_capacity(items.len() + 1);
    rows.push(format!(
        "{:<name$}  {:>10}  {:<19}  {}",
        "Name",
        "Size",
        "Modified Date",
        "Full Path",
        name = NAME_COLUMN_CHARS
    ));
    for item in items {
        rows.push(format!(
            "{:<name$}  {:>10}  {:<19}  {}",
            truncate_middle(&item.name, NAME_COLUMN_CHARS),
            human_readable_size(item.size),
            format_modified(item.modified_unix_secs),
            item.path.display(),
            name = NAME_COLUMN_CHARS
        ));
    }
    rows
}

pub(crate) fn report_line(report: &IndexReport) -> String {
    format!(
        "Index loaded: {} files under {} names from {} ({} skipped, {:.2}s)",
        report.files,
        report.names,
        report.root.display(),
        report.skipped,
        report.elapsed.as_secs_f64()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_binary_units() {
        assert_eq!(human_readable_size(0), "0 B");
        assert_eq!(human_readable_size(1023), "1023 B");
        assert_eq!(human_readable_size(1024), "1 KB");
        assert_eq!(human_readable_size(5 * 1024 * 1024 + 10), "5 MB");
        assert_eq!(human_readable_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(human_readable_size(1536 * 1024 * 1024 * 1024), "1.50 TB");
    }

    #[test]
    fn unknown_timestamp_renders_as_dash() {
        assert_eq!(format_modified(UNKNOWN_TS), "-");
        assert_eq!(format_modified(0).len(), 19);
    }

    #[test]
    fn truncate_middle_keeps_both_ends() {
        assert_eq!(truncate_middle("short.txt", 40), "short.txt");
        assert_eq!(truncate_middle("abcdefghij", 7), "ab...ij");
        assert_eq!(truncate_middle("abcdefghij", 2), "...");
    }

    #[test]
    fn empty_results_render_placeholder() {
        assert_eq!(result_rows(&[]), vec!["No files found".to_string()]);
    }

    #[test]
    fn rows_include_header_and_full_path() {
        let items = vec![SearchItem {
            name: "report.txt".to_string(),
            path: "/a/report.txt".into(),
            size: 2048,
            modified_unix_secs: UNKNOWN_TS,
        }];

        let rows = result_rows(&items);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("Name"));
        assert!(rows[1].starts_with("report.txt"));
        assert!(rows[1].contains("2 KB"));
        assert!(rows[1].ends_with("/a/report.txt"));
    }
}
