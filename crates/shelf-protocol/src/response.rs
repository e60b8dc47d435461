//! Response types

/// Acknowledgement of a save. The body is opaque; it is kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    pub body: String,
}

impl Ack {
    /// Longest body excerpt kept for log lines
    pub const EXCERPT_LEN: usize = 200;

    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    /// A bounded, single-line excerpt of the body
    pub fn excerpt(&self) -> String {
        excerpt(&self.body, Self::EXCERPT_LEN)
    }
}

/// Trim a response body to at most `max` chars on one line
pub fn excerpt(body: &str, max: usize) -> String {
    let flat: String = body
        .trim()
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(max + 1)
        .collect();

    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}
