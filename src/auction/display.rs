// region:    --- Bidder Masking

/// Deterministic bidder label for bid history and participant lists.
///
/// The raw name or email never reaches the wire; the label depends only on
/// the stored identity fields, so repeated bids by the same bidder always
/// carry the same mask within an auction view.
pub fn mask_bidder(name: Option<&str>, email: Option<&str>, bidder_id: i64) -> String {
    if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
        return mask_word(name);
    }
    if let Some(email) = email.map(str::trim).filter(|e| !e.is_empty()) {
        let local = email.split('@').next().unwrap_or(email);
        if !local.is_empty() {
            return mask_word(local);
        }
    }
    format!("Participant #{bidder_id}")
}

/// First and last character kept, middle replaced. A single-character word
/// still yields a non-identifying label.
fn mask_word(word: &str) -> String {
    let mut chars = word.chars();
    let first = chars.next();
    let last = chars.next_back();
    match (first, last) {
        (Some(f), Some(l)) => format!("{f}***{l}"),
        (Some(f), None) => format!("{f}***"),
        _ => "***".to_string(),
    }
}

// endregion: --- Bidder Masking

// region:    --- Tests


// endregion: --- Tests
