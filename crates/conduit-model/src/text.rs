/// Turn an identifier such as `bridgeErrorHandler` or `step-id` into a title
/// (`Bridge Error Handler`, `Step Id`).
pub fn humanize(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == '_' || c == '.' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("bridgeErrorHandler"), "Bridge Error Handler");
        assert_eq!(humanize("lazyStartProducer"), "Lazy Start Producer");
        assert_eq!(humanize("step-id"), "Step Id");
        assert_eq!(humanize("httpURI"), "Http URI");
        assert_eq!(humanize("URIPath"), "URI Path");
        assert_eq!(humanize("name"), "Name");
        assert_eq!(humanize("aws2_s3"), "Aws2 S3");
        assert_eq!(humanize(""), "");
    }
}
