use super::parser::OrgParser;
use super::{Headline, OrgDocument, Priority, TodoState};

/// Maximum title length when deriving a title from free-form note text.
pub const TITLE_MAX_LEN: usize = 100;

/// Serializer and structural mutation operations for outline documents.
pub struct OrgWriter;

impl OrgWriter {
    /// Write a complete document: preamble, then top-level headlines
    /// separated by one blank line.
    pub fn write_document(doc: &OrgDocument) -> String {
        let mut out = String::new();

        if !doc.preamble.trim().is_empty() {
            out.push_str(&doc.preamble);
            out.push_str("\n\n");
        }

        for (i, headline) in doc.headlines.iter().enumerate() {
            out.push_str(&Self::write_headline(headline));
            if i < doc.headlines.len() - 1 {
                out.push('\n');
            }
        }

        out
    }

    /// Write a headline and all its descendants.
    ///
    /// Line order is fixed for round-trip fidelity: headline line, CLOSED,
    /// SCHEDULED, DEADLINE, property drawer, body, then children with no
    /// blank-line separation.
    pub fn write_headline(headline: &Headline) -> String {
        let mut out = String::new();

        out.push_str(&"*".repeat(headline.level));
        out.push(' ');
        if let Some(state) = headline.state {
            out.push_str(state.as_keyword());
            out.push(' ');
        }
        if let Some(priority) = headline.priority {
            out.push_str(priority.as_org());
            out.push(' ');
        }
        out.push_str(&headline.title);
        if !headline.tags.is_empty() {
            out.push_str(" :");
            out.push_str(&headline.tags.join(":"));
            out.push(':');
        }
        out.push('\n');

        if let Some(ref closed) = headline.closed {
            out.push_str(&format!("CLOSED: {closed}\n"));
        }
        if let Some(ref scheduled) = headline.scheduled {
            out.push_str(&format!("SCHEDULED: {scheduled}\n"));
        }
        if let Some(ref deadline) = headline.deadline {
            out.push_str(&format!("DEADLINE: {deadline}\n"));
        }

        if !headline.properties.is_empty() {
            out.push_str(":PROPERTIES:\n");
            for (key, value) in &headline.properties {
                out.push_str(&format!(":{key}: {value}\n"));
            }
            out.push_str(":END:\n");
        }

        if !headline.body.trim().is_empty() {
            out.push_str(&headline.body);
            out.push('\n');
        }

        for child in &headline.children {
            out.push_str(&Self::write_headline(child));
        }

        out
    }

    /// Append a headline to existing document text.
    ///
    /// With a target section, the document is re-parsed and the new headline
    /// inserted as the last child of the first headline (depth-first document
    /// order) whose title matches; its level is coerced to parent level + 1.
    /// A missing target falls back to an end-of-file append.
    pub fn append_entry(
        existing: &str,
        new_headline: &Headline,
        target_section: Option<&str>,
    ) -> String {
        if existing.trim().is_empty() {
            return Self::write_headline(new_headline);
        }

        let Some(target) = target_section else {
            return append_at_end(existing, new_headline);
        };

        let mut doc = OrgParser::parse(existing);
        if !insert_under_first_match(&mut doc.headlines, target, new_headline) {
            return append_at_end(existing, new_headline);
        }
        Self::write_document(&doc)
    }

    /// Prepend a headline before existing document text.
    pub fn prepend_entry(existing: &str, new_headline: &Headline) -> String {
        if existing.trim().is_empty() {
            return Self::write_headline(new_headline);
        }
        format!("{}\n{existing}", Self::write_headline(new_headline))
    }

    /// Build a headline from free-form note text: the first line becomes the
    /// length-capped title, the rest becomes the body.
    pub fn create_headline(
        text: &str,
        level: usize,
        state: Option<TodoState>,
        tags: Vec<String>,
        priority: Option<Priority>,
        properties: Vec<(String, String)>,
    ) -> Headline {
        let mut lines = text.lines();
        let title: String = lines
            .next()
            .unwrap_or("Untitled")
            .chars()
            .take(TITLE_MAX_LEN)
            .collect();
        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();

        Headline {
            level,
            state,
            priority,
            title,
            tags,
            properties,
            body,
            ..Headline::default()
        }
    }
}

/// End-of-file append with exactly one blank line of separation.
fn append_at_end(existing: &str, new_headline: &Headline) -> String {
    format!(
        "{}\n\n{}",
        existing.trim_end(),
        OrgWriter::write_headline(new_headline)
    )
}

/// Re-level a headline (and its subtree) so it nests correctly under a parent.
fn relevel(headline: &Headline, level: usize) -> Headline {
    let mut out = headline.clone();
    out.level = level;
    out.children = headline
        .children
        .iter()
        .map(|c| relevel(c, level + 1))
        .collect();
    out
}

/// Insert `new_headline` as the last child of the first headline titled
/// `target`, walking depth-first. Returns false when no title matches.
fn insert_under_first_match(
    headlines: &mut [Headline],
    target: &str,
    new_headline: &Headline,
) -> bool {
    for headline in headlines {
        if headline.title == target {
            let child = relevel(new_headline, headline.level + 1);
            headline.children.push(child);
            return true;
        }
        if insert_under_first_match(&mut headline.children, target, new_headline) {
            return true;
        }
    }
    false
}
