use ce_core::types::truncate_chars;

/// Build the rewrite prompt. `original` is cut to its first `original_cap` characters.
pub fn build_prompt(title: &str, original: Option<&str>, digest: &str, original_cap: usize) -> String {
    let original = match original {
        Some(content) if !content.trim().is_empty() => truncate_chars(content, original_cap),
        _ => "No content.",
    };
    let insights = if digest.trim().is_empty() {
        "No competitor content was available."
    } else {
        digest
    };

    format!(
        "You are an expert SEO Editor.\n\
         Task: Rewrite this article using the provided competitor insights.\n\
         \n\
         Original Title: {title}\n\
         Original Content: {original}\n\
         \n\
         Competitor Insights:\n\
         {insights}\n\
         \n\
         Requirements:\n\
         1. Return ONLY the HTML body (no <html>, <head> tags).\n\
         2. Use <h2> and <p> tags.\n\
         3. Make it detailed and professional.\n"
    )
}

/// Models often wrap HTML in a Markdown fence; keep only the inside.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // drop the language tag on the opening line
    match body.find('\n') {
        Some(idx) => body[idx + 1..].trim(),
        None => body.trim(),
    }
}
