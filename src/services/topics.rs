use std::sync::OnceLock;

use regex::Regex;

const MAX_TOPICS: usize = 3;

/// Topic labels with the keywords that vote for them. Order breaks ties.
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    ("Health and social care", &["nhs", "health", "care", "hospital", "dental", "cancer", "mental health"]),
    ("Education and skills", &["school", "education", "learner", "curriculum", "inset", "teacher", "university"]),
    ("Transport", &["transport", "rail", "bus", "road", "traffic", "20mph", "active travel"]),
    ("Environment and climate change", &["climate", "flood", "carbon", "emissions", "energy", "net zero", "environment"]),
    ("Business, economy and innovation", &["economy", "business", "investment", "innovation", "trade", "growth"]),
    ("Housing", &["housing", "rent", "landlord", "homeless", "property"]),
    ("Justice and law", &["law", "legal", "justice", "tribunal", "statutory", "legislation", "order"]),
    ("Public sector", &["public", "government", "local authority", "council", "procurement"]),
    ("Children and families", &["child", "children", "family", "safeguarding", "looked after"]),
    ("Coronavirus (COVID-19)", &["covid", "coronavirus", "pandemic"]),
    ("Welsh language", &["welsh language", "cymraeg", "welsh-speaking"]),
    ("Digital", &["digital", "data", "online", "ai", "technology"]),
    ("Employment and work", &["employment", "work", "jobs", "labour market", "wages"]),
];

fn matchers() -> &'static [(&'static str, Vec<Regex>)] {
    static MATCHERS: OnceLock<Vec<(&'static str, Vec<Regex>)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        TOPIC_KEYWORDS
            .iter()
            .map(|(topic, keywords)| {
                let patterns = keywords
                    .iter()
                    .filter_map(|kw| Regex::new(&format!(r"\b{}\b", regex::escape(kw))).ok())
                    .collect();
                (*topic, patterns)
            })
            .collect()
    })
}

/// Up to three topics, highest keyword count first. A topic needs at least
/// one keyword hit in the title or body.
pub fn guess_topics(title: &str, body: &str) -> Vec<String> {
    let text = format!("{title} {body}").to_lowercase();

    let mut scored: Vec<(&str, usize)> = matchers()
        .iter()
        .map(|(topic, patterns)| {
            let hits = patterns.iter().filter(|re| re.is_match(&text)).count();
            (*topic, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();

    // stable sort keeps table order among equal scores
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    scored
        .into_iter()
        .take(MAX_TOPICS)
        .map(|(topic, _)| topic.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_strongest_topics() {
        let topics = guess_topics(
            "New funding for school buses",
            "The education minister announced rail and bus improvements for every school and university.",
        );
        assert_eq!(topics[0], "Education and skills");
        assert_eq!(topics[1], "Transport");
        assert!(topics.len() <= 3);
    }

    #[test]
    fn whole_words_only() {
        // "training" must not count as "rail", "said" must not count as "ai"
        let topics = guess_topics("Training", "He said so.");
        assert!(topics.is_empty());
    }

    #[test]
    fn never_more_than_three() {
        let topics = guess_topics(
            "Everything",
            "health school transport climate economy housing law council children covid digital jobs",
        );
        assert_eq!(topics.len(), 3);
    }
}
