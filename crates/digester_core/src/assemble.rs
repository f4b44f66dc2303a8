use std::collections::HashSet;

use crate::Article;

/// Drop every article whose title, content or summary contains one of the
/// denylisted words (case-insensitive substring match).
pub fn filter_by_denylist(articles: Vec<Article>, denylist: &[String]) -> Vec<Article> {
    let words: Vec<String> = denylist
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect();
    if articles.is_empty() || words.is_empty() {
        return articles;
    }

    articles
        .into_iter()
        .filter(|article| !matches_any(article, &words))
        .collect()
}

fn matches_any(article: &Article, words: &[String]) -> bool {
    let title = article.title.to_lowercase();
    let content = article.content.to_lowercase();
    let summary = article.summary.to_lowercase();
    words
        .iter()
        .any(|w| title.contains(w) || content.contains(w) || summary.contains(w))
}

/// Keep the first article for each distinct URL, preserving order.
pub fn dedup_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::with_capacity(articles.len());
    articles
        .into_iter()
        .filter(|article| seen.insert(article.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, url: &str) -> Article {
        Article::new(title, url)
    }

    #[test]
    fn blank_denylist_words_are_ignored() {
        let articles = vec![article("Anything", "https://a")];
        let kept = filter_by_denylist(articles.clone(), &["  ".to_string()]);
        assert_eq!(kept, articles);
    }

    #[test]
    fn dedup_on_empty_input_is_empty() {
        assert!(dedup_by_url(Vec::new()).is_empty());
    }
}
