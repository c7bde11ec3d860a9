use regex::Regex;
use std::sync::LazyLock;

use super::{Headline, OrgDocument, Priority, TodoState};

static HEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<stars>\*+)\s+(?:(?P<state>TODO|IN-PROGRESS|WAITING|DONE|CANCELLED)\s+)?(?:\[#(?P<priority>[ABC])\]\s+)?(?P<title>.*?)(?:\s+:(?P<tags>[^\s:]+(?::[^\s:]+)*):)?\s*$",
    )
    .unwrap()
});

static SCHEDULED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*SCHEDULED:\s*(?P<ts>.+)$").unwrap());

static DEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*DEADLINE:\s*(?P<ts>.+)$").unwrap());

static CLOSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*CLOSED:\s*(?P<ts>.+)$").unwrap());

static DRAWER_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*:PROPERTIES:\s*$").unwrap());

static DRAWER_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*:END:\s*$").unwrap());

static PROPERTY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*:(?P<key>[^:]+):\s*(?P<value>.*)$").unwrap());

/// Parser for the outline subset this application produces and consumes.
pub struct OrgParser;

impl OrgParser {
    /// Parse outline text into a document. Never fails: lines that don't
    /// match the headline grammar degrade to preamble or body text.
    pub fn parse(input: &str) -> OrgDocument {
        if input.trim().is_empty() {
            return OrgDocument::default();
        }

        let lines: Vec<&str> = input.lines().collect();
        let mut i = 0;

        // Everything before the first headline is preamble.
        let mut preamble_lines = Vec::new();
        while i < lines.len() && !is_headline(lines[i]) {
            preamble_lines.push(lines[i]);
            i += 1;
        }

        let mut headlines = Vec::new();
        while i < lines.len() {
            match parse_headline(&lines, i) {
                Some((headline, next)) => {
                    headlines.push(headline);
                    i = next;
                }
                None => i += 1,
            }
        }

        OrgDocument {
            preamble: preamble_lines.join("\n").trim().to_string(),
            headlines,
        }
    }
}

fn is_headline(line: &str) -> bool {
    line.starts_with('*') && HEADLINE_RE.is_match(line)
}

fn marker_count(line: &str) -> usize {
    line.chars().take_while(|c| *c == '*').count()
}

/// Parse one headline plus its planning lines, property drawer, body and
/// direct children. Returns the node and the index of the first line that
/// belongs to a sibling or shallower headline.
fn parse_headline(lines: &[&str], start: usize) -> Option<(Headline, usize)> {
    let caps = HEADLINE_RE.captures(lines[start])?;

    let level = caps.name("stars").map(|m| m.as_str().len()).unwrap_or(1);
    let state = caps
        .name("state")
        .and_then(|m| TodoState::from_keyword(m.as_str()));
    let priority = caps
        .name("priority")
        .and_then(|m| Priority::from_org(m.as_str()));
    let title = caps
        .name("title")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let tags: Vec<String> = caps
        .name("tags")
        .map(|m| {
            m.as_str()
                .split(':')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut i = start + 1;
    let mut scheduled = None;
    let mut deadline = None;
    let mut closed = None;
    let mut headline = Headline {
        level,
        state,
        priority,
        title,
        tags,
        ..Headline::default()
    };

    // Planning lines and the property drawer directly follow the headline.
    // A later duplicate of the same planning kind overwrites the earlier one.
    while i < lines.len() && !lines[i].trim().is_empty() {
        let line = lines[i];

        if let Some(caps) = SCHEDULED_RE.captures(line) {
            scheduled = Some(caps["ts"].trim().to_string());
            i += 1;
            continue;
        }
        if let Some(caps) = DEADLINE_RE.captures(line) {
            deadline = Some(caps["ts"].trim().to_string());
            i += 1;
            continue;
        }
        if let Some(caps) = CLOSED_RE.captures(line) {
            closed = Some(caps["ts"].trim().to_string());
            i += 1;
            continue;
        }

        if DRAWER_START_RE.is_match(line) {
            i += 1;
            while i < lines.len() && !DRAWER_END_RE.is_match(lines[i]) {
                // Malformed drawer lines are silently skipped.
                if let Some(caps) = PROPERTY_RE.captures(lines[i]) {
                    headline.set_property(caps["key"].trim(), caps["value"].trim());
                }
                i += 1;
            }
            if i < lines.len() {
                i += 1; // skip :END:
            }
            continue;
        }

        break;
    }

    headline.scheduled = scheduled;
    headline.deadline = deadline;
    headline.closed = closed;

    // Body text interleaved with direct children. A headline more than one
    // level deeper is a stray and folds into the body.
    let mut body_lines = Vec::new();
    while i < lines.len() {
        let line = lines[i];

        if is_headline(line) {
            let child_level = marker_count(line);
            if child_level <= level {
                break;
            }
            if child_level == level + 1 {
                if let Some((child, next)) = parse_headline(lines, i) {
                    headline.children.push(child);
                    i = next;
                    continue;
                }
            }
        }

        body_lines.push(line);
        i += 1;
    }

    headline.body = body_lines.join("\n").trim().to_string();

    Some((headline, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_headline() {
        let doc = OrgParser::parse(
            "* TODO [#A] Buy milk :errand:shopping:\nSCHEDULED: <2026-01-01>\nGet 2%",
        );
        assert_eq!(doc.headlines.len(), 1);
        let h = &doc.headlines[0];
        assert_eq!(h.level, 1);
        assert_eq!(h.state, Some(TodoState::Todo));
        assert_eq!(h.priority, Some(Priority::A));
        assert_eq!(h.title, "Buy milk");
        assert_eq!(h.tags, vec!["errand", "shopping"]);
        assert_eq!(h.scheduled.as_deref(), Some("<2026-01-01>"));
        assert_eq!(h.body, "Get 2%");
    }

    #[test]
    fn blank_input_yields_empty_document() {
        let doc = OrgParser::parse("   \n\n  ");
        assert!(doc.preamble.is_empty());
        assert!(doc.headlines.is_empty());
    }

    #[test]
    fn preamble_collected_before_first_headline() {
        let doc = OrgParser::parse("#+TITLE: Inbox\nsome notes\n\n* First\n* Second\n");
        assert_eq!(doc.preamble, "#+TITLE: Inbox\nsome notes");
        assert_eq!(doc.headlines.len(), 2);
    }

    #[test]
    fn empty_title_is_legal() {
        let doc = OrgParser::parse("* \nbody text\n");
        assert_eq!(doc.headlines.len(), 1);
        assert_eq!(doc.headlines[0].title, "");
        assert_eq!(doc.headlines[0].body, "body text");
    }

    #[test]
    fn nested_children_one_level_at_a_time() {
        let doc = OrgParser::parse("* Parent\n** Child A\n*** Grandchild\n** Child B\n* Sibling\n");
        assert_eq!(doc.headlines.len(), 2);
        let parent = &doc.headlines[0];
        assert_eq!(parent.children.len(), 2);
        assert_eq!(parent.children[0].title, "Child A");
        assert_eq!(parent.children[0].children[0].title, "Grandchild");
        assert_eq!(parent.children[1].title, "Child B");
    }

    #[test]
    fn level_invariant_holds_for_all_parsed_children() {
        let doc = OrgParser::parse("* A\n** B\n*** C\n** D\n* E\n** F\n");
        fn check(h: &Headline) {
            for c in &h.children {
                assert_eq!(c.level, h.level + 1);
                check(c);
            }
        }
        for h in &doc.headlines {
            check(h);
        }
    }

    #[test]
    fn stray_deep_headline_folds_into_body() {
        let doc = OrgParser::parse("* Parent\n*** Too deep\n** Child\n");
        let parent = &doc.headlines[0];
        assert_eq!(parent.body, "*** Too deep");
        assert_eq!(parent.children.len(), 1);
        assert_eq!(parent.children[0].title, "Child");
    }

    #[test]
    fn duplicate_planning_line_last_wins() {
        let doc = OrgParser::parse("* Task\nSCHEDULED: <2026-01-01>\nSCHEDULED: <2026-02-02>\n");
        assert_eq!(doc.headlines[0].scheduled.as_deref(), Some("<2026-02-02>"));
    }

    #[test]
    fn closed_line_parsed() {
        let doc = OrgParser::parse("* DONE Task\nCLOSED: [2026-03-01 Sun 10:00]\n");
        let h = &doc.headlines[0];
        assert_eq!(h.state, Some(TodoState::Done));
        assert_eq!(h.closed.as_deref(), Some("[2026-03-01 Sun 10:00]"));
    }

    #[test]
    fn property_drawer_parsed_in_order_and_malformed_lines_skipped() {
        let doc = OrgParser::parse(
            "* Task\n:PROPERTIES:\n:CREATED: 2026-01-01\nnot a property\n:SOURCE: voice\n:END:\nbody\n",
        );
        let h = &doc.headlines[0];
        assert_eq!(
            h.properties,
            vec![
                ("CREATED".to_string(), "2026-01-01".to_string()),
                ("SOURCE".to_string(), "voice".to_string())
            ]
        );
        assert_eq!(h.body, "body");
    }

    #[test]
    fn unterminated_drawer_consumes_to_end_of_input() {
        let doc = OrgParser::parse("* Task\n:PROPERTIES:\n:KEY: v\n");
        assert_eq!(doc.headlines[0].property("KEY"), Some("v"));
    }

    #[test]
    fn indented_stars_are_body_not_headlines() {
        let doc = OrgParser::parse("* Task\n  * bullet item\n");
        assert_eq!(doc.headlines.len(), 1);
        assert_eq!(doc.headlines[0].body, "* bullet item");
    }

    #[test]
    fn tags_require_no_interior_whitespace() {
        let doc = OrgParser::parse("* Meeting notes :work:\n* Ratio is 3:2 today\n");
        assert_eq!(doc.headlines[0].tags, vec!["work"]);
        assert_eq!(doc.headlines[1].title, "Ratio is 3:2 today");
        assert!(doc.headlines[1].tags.is_empty());
    }
}
