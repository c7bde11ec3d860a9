pub mod parser;
pub mod writer;

/// Workflow state keyword on a headline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoState {
    Todo,
    InProgress,
    Waiting,
    Done,
    Cancelled,
}

impl TodoState {
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN-PROGRESS",
            Self::Waiting => "WAITING",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "TODO" => Some(Self::Todo),
            "IN-PROGRESS" => Some(Self::InProgress),
            "WAITING" => Some(Self::Waiting),
            "DONE" => Some(Self::Done),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// Single-letter priority rank. A ranks highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    A,
    B,
    C,
}

impl Priority {
    pub fn as_org(&self) -> &'static str {
        match self {
            Self::A => "[#A]",
            Self::B => "[#B]",
            Self::C => "[#C]",
        }
    }

    pub fn from_org(s: &str) -> Option<Self> {
        match s {
            "A" | "#A" | "[#A]" => Some(Self::A),
            "B" | "#B" | "[#B]" => Some(Self::B),
            "C" | "#C" | "[#C]" => Some(Self::C),
            _ => None,
        }
    }
}

/// A titled, leveled node in the outline tree.
///
/// Planning timestamps are kept as raw formatted strings; this model does not
/// interpret date semantics, it only preserves the text for round-tripping.
/// Properties keep insertion order. A child's level is always the parent's
/// level plus one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Headline {
    pub level: usize,
    pub state: Option<TodoState>,
    pub priority: Option<Priority>,
    pub title: String,
    pub tags: Vec<String>,
    pub scheduled: Option<String>,
    pub deadline: Option<String>,
    pub closed: Option<String>,
    pub properties: Vec<(String, String)>,
    pub body: String,
    pub children: Vec<Headline>,
}

impl Headline {
    pub fn new(title: impl Into<String>, level: usize) -> Self {
        Self {
            level,
            title: title.into(),
            ..Self::default()
        }
    }

    /// Look up a property value by key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a property, overwriting an existing key in place to keep
    /// first-insertion order on write.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.properties.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.properties.push((key, value));
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// A complete outline file: free-text preamble plus top-level headlines.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrgDocument {
    pub preamble: String,
    pub headlines: Vec<Headline>,
}

impl OrgDocument {
    /// All headlines flattened in depth-first document order.
    pub fn all_headlines(&self) -> Vec<&Headline> {
        fn walk<'a>(headlines: &'a [Headline], out: &mut Vec<&'a Headline>) {
            for h in headlines {
                out.push(h);
                walk(&h.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.headlines, &mut out);
        out
    }

    /// First headline with the given title, in depth-first document order.
    pub fn find_headline(&self, title: &str) -> Option<&Headline> {
        self.all_headlines().into_iter().find(|h| h.title == title)
    }
}
