//! Conservative token estimate.
//!
//! Chat models use byte-level BPE vocabularies, where every token covers at
//! least one byte of UTF-8 input. Counting bytes therefore never
//! under-counts, whatever the text: ObjectIds, digits, punctuation and
//! Arabic names included. Exactness is not a goal; staying under the model's
//! input limit is.
//!
//! The threshold check and the chunker share these functions, so a chunk the
//! chunker accepted is never rejected by the threshold.

/// Estimated tokens for a single whitespace-free word, counting the one
/// separator the chunker puts in front of it. Never zero.
pub fn estimate_word_tokens(word: &str) -> usize {
    word.len() + 1
}

/// Estimated tokens for `text` as sent: its length in bytes, whitespace
/// included. For words joined by single spaces this never exceeds the sum of
/// [`estimate_word_tokens`].
pub fn estimate_tokens(text: &str) -> usize {
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn bpe_tokens(text: &str) -> usize {
        tiktoken_rs::r50k_base()
            .unwrap()
            .encode_with_special_tokens(text)
            .len()
    }

    #[test]
    fn test_word_estimate_counts_bytes_and_separator() {
        assert_eq!(estimate_word_tokens("a"), 2);
        assert_eq!(estimate_word_tokens("\"sizeType\":"), 12);
        // Three characters, six bytes.
        assert_eq!(estimate_word_tokens("شاح"), 7);
    }

    #[test]
    fn test_text_estimate_counts_whitespace() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("   \n\t "), 6);
        assert_eq!(estimate_tokens("abc def"), 7);
    }

    #[test]
    fn test_joined_words_stay_within_word_estimates() {
        let words = ["{", "\"_id\":", "\"65f1c0e2a4b3\",", "\"شاحنة\""];
        let joined = words.join(" ");
        let summed: usize = words.iter().map(|w| estimate_word_tokens(w)).sum();
        assert!(estimate_tokens(&joined) <= summed);
    }

    #[test]
    fn test_estimate_bounds_bpe_on_object_ids() {
        let items: Vec<Value> = (0..50)
            .map(|i| json!({"_id": format!("65f1c0e2a4b3{i:012x}"), "price": 1000 + i * 37}))
            .collect();
        let text = serde_json::to_string_pretty(&json!({"data": {"itemList": items}})).unwrap();

        assert!(estimate_tokens(&text) >= bpe_tokens(&text));
    }

    #[test]
    fn test_estimate_bounds_bpe_on_arabic_names() {
        let items: Vec<Value> = (0..50)
            .map(|i| {
                json!({
                    "_id": format!("65f1c0e2a4b3{i:012x}"),
                    "name": format!("شركة النقل السريع {i}"),
                    "sizeType": "شاحنة صغيرة",
                })
            })
            .collect();
        let text = serde_json::to_string_pretty(&json!({"data": {"itemList": items}})).unwrap();

        assert!(estimate_tokens(&text) >= bpe_tokens(&text));
    }
}
