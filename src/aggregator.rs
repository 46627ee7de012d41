use {
    crate::record::Record,
    std::collections::HashMap,
};

/// Statistics produced by one aggregation pass
///
/// Transient: recomputed on every pass and only lives long enough to be
/// formatted into a notification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateSummary {
    pub longest_description: String,
    pub mode_word: String,
    pub least_frequent_words: Vec<String>,
    pub record_count: usize,
}

impl AggregateSummary {
    /// Render the chat message for this summary
    pub fn to_message(&self) -> String {
        format!(
            "Longest description: {}\nMost occurring word: {}\nLeast occurring word(s): {}\nNumber of messages processed: {}",
            self.longest_description,
            self.mode_word,
            self.least_frequent_words.join(", "),
            self.record_count
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct WordStat {
    count: usize,
    first_seen: usize,
}

/// Streaming word-frequency aggregator
///
/// Single pass with running extrema. Descriptions are observed one at a time,
/// so the source never has to be materialized twice.
///
/// - Longest description uses strict `>` on byte length: the first of several
///   equally long descriptions wins.
/// - Mode word is the first token to reach the running maximum count; a later
///   token that only ties the maximum does not displace it.
/// - Least frequent words are all words sharing the minimum count.
#[derive(Debug, Default)]
pub struct WordFrequencyAggregator {
    longest: String,
    word_count: HashMap<String, WordStat>,
    mode: String,
    mode_count: usize,
    record_count: usize,
}

impl WordFrequencyAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one description into the running statistics
    pub fn observe(&mut self, description: &str) {
        if description.len() > self.longest.len() {
            self.longest = description.to_string();
        }

        for token in description.split_whitespace() {
            let next_index = self.word_count.len();
            let stat = self
                .word_count
                .entry(token.to_string())
                .or_insert(WordStat { count: 0, first_seen: next_index });
            stat.count += 1;

            if stat.count > self.mode_count {
                self.mode_count = stat.count;
                if self.mode != token {
                    self.mode = token.to_string();
                }
            }
        }

        self.record_count += 1;
    }

    pub fn observe_record(&mut self, record: &Record) {
        self.observe(record.description());
    }

    /// Number of descriptions observed so far
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Occurrences of `word` in this pass (0 if never seen)
    pub fn word_count(&self, word: &str) -> usize {
        self.word_count.get(word).map_or(0, |s| s.count)
    }

    /// Close the pass and produce the summary
    pub fn finish(self) -> AggregateSummary {
        // Empty table means no least-frequent words, not a sentinel minimum
        let least_frequent_words = match self.word_count.values().map(|s| s.count).min() {
            None => Vec::new(),
            Some(min_count) => {
                let mut ties: Vec<(&String, usize)> = self
                    .word_count
                    .iter()
                    .filter(|(_, stat)| stat.count == min_count)
                    .map(|(word, stat)| (word, stat.first_seen))
                    .collect();
                // order ties by first appearance so output is stable across runs
                ties.sort_by_key(|(_, first_seen)| *first_seen);
                ties.into_iter().map(|(word, _)| word.clone()).collect()
            }
        };

        AggregateSummary {
            longest_description: self.longest,
            mode_word: self.mode,
            least_frequent_words,
            record_count: self.record_count,
        }
    }
}

/// Aggregate a finite sequence of records in source order
pub fn aggregate<'a, I>(records: I) -> AggregateSummary
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut aggregator = WordFrequencyAggregator::new();
    for record in records {
        aggregator.observe_record(record);
    }
    aggregator.finish()
}

/// Aggregate bare descriptions (the text-only store query)
pub fn aggregate_descriptions<I, S>(descriptions: I) -> AggregateSummary
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut aggregator = WordFrequencyAggregator::new();
    for description in descriptions {
        aggregator.observe(description.as_ref());
    }
    aggregator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(description: &str) -> Record {
        Record::new("2024-02-01", "Heroku", description, 1.0).unwrap()
    }

    #[test]
    fn test_empty_input() {
        let summary = aggregate(&Vec::<Record>::new());

        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.longest_description, "");
        assert_eq!(summary.mode_word, "");
        assert!(summary.least_frequent_words.is_empty());
    }

    #[test]
    fn test_all_empty_descriptions() {
        let summary = aggregate_descriptions(["", "   ", "\t"]);

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.mode_word, "");
        assert!(summary.least_frequent_words.is_empty());
        // whitespace-only descriptions still count toward longest
        assert_eq!(summary.longest_description, "   ");
    }

    #[test]
    fn test_reference_scenario() {
        let records = vec![record("x y"), record("x"), record("y y z")];
        let mut aggregator = WordFrequencyAggregator::new();
        for r in &records {
            aggregator.observe_record(r);
        }

        assert_eq!(aggregator.word_count("x"), 2);
        assert_eq!(aggregator.word_count("y"), 3);
        assert_eq!(aggregator.word_count("z"), 1);

        let summary = aggregator.finish();
        assert_eq!(summary.longest_description, "y y z");
        assert_eq!(summary.mode_word, "y");
        assert_eq!(summary.least_frequent_words, vec!["z".to_string()]);
        assert_eq!(summary.record_count, 3);
    }

    #[test]
    fn test_mode_tie_first_to_reach_wins() {
        // a reaches 2 on the second description's first token, before b does
        let summary = aggregate_descriptions(["a b", "a b"]);
        assert_eq!(summary.mode_word, "a");

        // b reaches 2 first here
        let summary = aggregate_descriptions(["a b", "b a"]);
        assert_eq!(summary.mode_word, "b");
    }

    #[test]
    fn test_mode_not_displaced_by_equal_count() {
        let summary = aggregate_descriptions(["cat cat dog", "dog"]);
        assert_eq!(summary.mode_word, "cat");
    }

    #[test]
    fn test_longest_is_strict() {
        let summary = aggregate_descriptions(["abc", "xyz", "ab"]);
        assert_eq!(summary.longest_description, "abc");
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        let summary = aggregate_descriptions(["Cost cost cost"]);
        assert_eq!(summary.mode_word, "cost");
        assert_eq!(summary.least_frequent_words, vec!["Cost".to_string()]);
    }

    #[test]
    fn test_least_frequent_sound_and_complete() {
        let descriptions = [
            "alpha beta gamma",
            "alpha beta",
            "alpha delta epsilon",
        ];
        let mut aggregator = WordFrequencyAggregator::new();
        for d in descriptions {
            aggregator.observe(d);
        }
        let counts: Vec<(&str, usize)> = ["alpha", "beta", "gamma", "delta", "epsilon"]
            .iter()
            .map(|w| (*w, aggregator.word_count(w)))
            .collect();
        let min = counts.iter().map(|(_, c)| *c).min().unwrap();

        let summary = aggregator.finish();

        for (word, count) in counts {
            let listed = summary.least_frequent_words.iter().any(|w| w == word);
            assert_eq!(listed, count == min, "word {} with count {}", word, count);
        }
        assert_eq!(summary.least_frequent_words, vec!["gamma", "delta", "epsilon"]);
    }

    #[test]
    fn test_record_count_matches_sequence_length() {
        for n in [0usize, 1, 7, 250] {
            let descriptions: Vec<String> = (0..n).map(|i| format!("word{}", i % 5)).collect();
            let summary = aggregate_descriptions(&descriptions);
            assert_eq!(summary.record_count, n);
        }
    }

    #[test]
    fn test_message_format() {
        let summary = AggregateSummary {
            longest_description: "y y z".to_string(),
            mode_word: "y".to_string(),
            least_frequent_words: vec!["z".to_string(), "w".to_string()],
            record_count: 3,
        };

        assert_eq!(
            summary.to_message(),
            "Longest description: y y z\nMost occurring word: y\nLeast occurring word(s): z, w\nNumber of messages processed: 3"
        );
    }
}
