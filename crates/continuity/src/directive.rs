use std::collections::BTreeMap;

/// One of the three writeback actions a `-write` directive can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    Create,
    Append,
    Update,
}

impl WriteAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "create" => Some(Self::Create),
            "append" => Some(Self::Append),
            "update" => Some(Self::Update),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteDirective {
    pub file: String,
    pub action: WriteAction,
    pub frontmatter: BTreeMap<String, String>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparationDirective {
    pub topic: String,
    pub keywords: Vec<String>,
    pub content: String,
}

/// A closed enum of the three recognized directive kinds (§9's "dynamic
/// directive dispatch → tagged variants" redesign flag). A marker whose verb
/// doesn't match one of these three is left untouched as visible text —
/// there is no `Unknown` variant because unknown markers never become a
/// `DirectiveKind` in the first place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveKind {
    Write(WriteDirective),
    Proactive(String),
    Prepare(PreparationDirective),
}
