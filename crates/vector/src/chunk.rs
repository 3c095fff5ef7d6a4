//! Plain text chunking with fixed-size overlapping windows.

/// One chunk of extracted text, ordered by `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
  pub index: usize,
  pub text: String,
}

/// Split text into windows of at most `max_chars` characters with `overlap`
/// characters carried between adjacent chunks. Windows never split a char
/// boundary; empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
  debug_assert!(overlap < max_chars, "overlap must be smaller than the window");

  if text.trim().is_empty() || max_chars == 0 {
    return Vec::new();
  }

  let chars: Vec<char> = text.chars().collect();
  let step = max_chars.saturating_sub(overlap).max(1);

  let mut chunks = Vec::new();
  let mut start = 0;
  while start < chars.len() {
    let end = (start + max_chars).min(chars.len());
    let window: String = chars[start..end].iter().collect();
    if !window.trim().is_empty() {
      chunks.push(Chunk {
        index: chunks.len(),
        text: window,
      });
    }
    if end == chars.len() {
      break;
    }
    start += step;
  }
  chunks
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_yields_no_chunks() {
    assert!(chunk_text("", 100, 10).is_empty());
    assert!(chunk_text("   \n\t ", 100, 10).is_empty());
  }

  #[test]
  fn test_short_input_is_one_chunk() {
    let chunks = chunk_text("hello world", 100, 10);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "hello world");
  }

  #[test]
  fn test_overlap_carries_between_chunks() {
    let text = "abcdefghij";
    let chunks = chunk_text(text, 4, 2);
    assert_eq!(chunks[0].text, "abcd");
    assert_eq!(chunks[1].text, "cdef");
    assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
  }

  #[test]
  fn test_multibyte_boundaries() {
    let text = "日本語のテキストです";
    let chunks = chunk_text(text, 4, 1);
    assert!(chunks.iter().all(|c| c.text.chars().count() <= 4));
    let rebuilt: String = chunks.iter().map(|c| c.text.chars().take(3).collect::<String>()).collect();
    assert!(rebuilt.starts_with("日本語"));
  }
}
