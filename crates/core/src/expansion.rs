/// Trigger keyword and the terms appended when it occurs in a question.
pub const SYNONYMS: [(&str, [&str; 4]); 6] = [
    ("summary", ["overview", "abstract", "conclusion", "main points"]),
    ("benefits", ["advantages", "positives", "pros", "value"]),
    ("problems", ["issues", "challenges", "difficulties", "concerns"]),
    ("cost", ["price", "expense", "budget", "financial"]),
    ("process", ["procedure", "method", "steps", "approach"]),
    ("result", ["outcome", "finding", "conclusion", "effect"]),
];

/// Widens `question` for retrieval by appending the synonyms of every trigger
/// keyword it contains (case-insensitive substring match).
pub fn expand_query(question: &str) -> String {
    let lowered = question.to_lowercase();
    let mut terms = vec![question];

    for (trigger, synonyms) in SYNONYMS.iter() {
        if lowered.contains(trigger) {
            terms.extend(synonyms.iter().copied());
        }
    }

    terms.join(" ")
}
