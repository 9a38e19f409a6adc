//! Recursive character text splitter for the indexing pipeline.
//!
//! Splits on paragraph boundaries first, then lines, then words, then raw
//! characters, merging pieces back together up to `chunk_size` with
//! `chunk_overlap` characters carried between neighbouring chunks.

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        TextSplitter {
            chunk_size,
            // overlap must leave room for forward progress
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect()
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        if text.chars().count() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));

        if separator.is_empty() {
            return self.split_chars(text);
        }
        let next_separators = &separators[index + 1..];
        let sep_len = separator.chars().count();

        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for piece in text.split(separator) {
            let piece_len = piece.chars().count();

            // a single piece larger than a chunk descends to finer separators
            if piece_len > self.chunk_size {
                if !current.is_empty() {
                    chunks.push(current.join(separator));
                    current.clear();
                }
                chunks.extend(self.split_with(piece, next_separators));
                continue;
            }

            if !current.is_empty()
                && joined_len(&current, sep_len) + sep_len + piece_len > self.chunk_size
            {
                chunks.push(current.join(separator));
                // retain trailing pieces as overlap for the next chunk
                while !current.is_empty() && joined_len(&current, sep_len) > self.chunk_overlap {
                    current.remove(0);
                }
            }
            current.push(piece.to_string());
        }
        if !current.is_empty() {
            chunks.push(current.join(separator));
        }
        chunks
    }

    fn split_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = (self.chunk_size - self.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

fn joined_len(pieces: &[String], sep_len: usize) -> usize {
    let content: usize = pieces.iter().map(|p| p.chars().count()).sum();
    content + sep_len * pieces.len().saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new(100, 20);
        assert_eq!(splitter.split("hello world"), vec!["hello world"]);
    }

    #[test]
    fn paragraphs_split_before_words() {
        let splitter = TextSplitter::new(30, 0);
        let text = "first paragraph here\n\nsecond paragraph here";
        let chunks = splitter.split(text);
        assert_eq!(
            chunks,
            vec!["first paragraph here", "second paragraph here"]
        );
    }

    #[test]
    fn chunks_respect_the_size_limit() {
        let splitter = TextSplitter::new(25, 5);
        let text = "one two three four five six seven eight nine ten eleven twelve";
        for chunk in splitter.split(text) {
            assert!(chunk.chars().count() <= 25, "oversized chunk: '{}'", chunk);
        }
    }

    #[test]
    fn neighbouring_chunks_share_overlap() {
        let splitter = TextSplitter::new(12, 5);
        let chunks = splitter.split("aaaa bbbb cccc dddd");
        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let tail_word = pair[0].split(' ').last().unwrap_or("");
            assert!(
                pair[1].contains(tail_word),
                "no overlap between '{}' and '{}'",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_character_windows() {
        let splitter = TextSplitter::new(5, 2);
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcde", "defgh", "ghij"]);
    }
}
