//! Weekly blog post template and the release-notes search link.

use chrono::{Datelike, Days, NaiveDate};

use crate::promotion::NAMESPACE;

pub const RELEASE_NOTES_LABEL: &str = "has-release-notes";

/// English ordinal of a day of the month ("1st", "12th", "23rd").
pub fn format_day(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{day}{suffix}")
}

/// "January 1st".
pub fn format_date(date: NaiveDate) -> String {
    format!("{} {}", date.format("%B"), format_day(date.day()))
}

/// Front matter and heading of the weekly post.
#[derive(Debug, Clone)]
pub struct BlogPost {
    pub since: NaiveDate,
    pub till: NaiveDate,
    pub today: NaiveDate,
    pub author: Option<String>,
}

impl BlogPost {
    /// ISO weeks covered. Posts describe last week's work, so the week of
    /// `till` itself does not count.
    pub fn weeks(&self) -> (u32, u32) {
        let since = self.since.iso_week().week();
        let till = self.till.iso_week().week().saturating_sub(1);
        (since, till)
    }

    pub fn title(&self) -> String {
        match self.weeks() {
            (since, till) if since != till => format!("Weeks {since}–{till}"),
            (since, _) => format!("Week {since}"),
        }
    }

    pub fn file_name(&self) -> String {
        match self.weeks() {
            (since, till) if since != till => format!("week-{since}–{till}.md"),
            (since, _) => format!("week-{since}.md"),
        }
    }

    /// Where the post belongs in the website repository.
    pub fn location(&self) -> String {
        format!("packit.dev/weekly/{}/{}", self.since.year(), self.file_name())
    }

    fn author_line(&self) -> String {
        match &self.author {
            Some(author) => format!("authors: {author}"),
            None => "# TODO replace <login> with your kerberos login\nauthors: <login>".to_string(),
        }
    }

    /// Front matter plus the section heading, ready for the changelogs.
    pub fn header(&self) -> String {
        let month = self.since.format("%B");
        let year = self.since.year();
        let title = self.title();
        format!(
            "---\n\
             title: {title} in Packit\n\
             date: {today}\n\
             {author}\n\
             tags:\n  - {year}-{month}\n  - {year}\n  - {month}\n\
             ---\n\n\
             ## {title} ({since} – {till})\n",
            today = self.today.format("%Y-%m-%d"),
            author = self.author_line(),
            since = format_date(self.since),
            till = format_date(self.till),
        )
    }

    /// Whole post: header followed by one changelog block per repository.
    pub fn render<I, S>(&self, changelogs: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut post = self.header();
        post.push('\n');
        for changelog in changelogs {
            post.push_str(changelog.as_ref().trim_end());
            post.push('\n');
        }
        post
    }
}

/// Search for the week's merged pull requests that carry release notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GithubQuery {
    pub since: NaiveDate,
    pub till: NaiveDate,
}

impl GithubQuery {
    pub fn ending(till: NaiveDate) -> Self {
        let since = till.checked_sub_days(Days::new(7)).unwrap_or(till);
        Self { since, till }
    }

    /// Weekday of `since`; the previous post may already cover it.
    pub fn since_weekday(&self) -> String {
        self.since.format("%A").to_string()
    }

    pub fn url(&self) -> String {
        format!(
            "https://github.com/pulls?q=org%3A{NAMESPACE}+is%3Apr+merged%3A{since}..{till}+\
             sort%3Aupdated-asc+label%3A{RELEASE_NOTES_LABEL}",
            since = self.since.format("%Y-%m-%d"),
            till = self.till.format("%Y-%m-%d"),
        )
    }
}
