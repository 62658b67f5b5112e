use serde::{Deserialize, Serialize};

/// Token accounting for one completed request. Counters the response body
/// omits are zero, never absent.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default)]
    pub cache_write_input_tokens: u32,
    #[serde(default)]
    pub cache_read_input_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            ..Self::default()
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Prompt tokens including everything that hit the cache.
    pub fn total_input_tokens(&self) -> u32 {
        self.prompt_tokens + self.cache_write_input_tokens + self.cache_read_input_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_the_relevant_counters() {
        let usage = Usage {
            prompt_tokens: 10,
            completion_tokens: 20,
            cache_write_input_tokens: 5,
            cache_read_input_tokens: 7,
        };

        assert_eq!(usage.total_tokens(), 30);
        assert_eq!(usage.total_input_tokens(), 22);
    }

    #[test]
    fn new_zeroes_the_cache_counters() {
        let usage = Usage::new(1, 2);
        assert_eq!(usage.cache_write_input_tokens, 0);
        assert_eq!(usage.cache_read_input_tokens, 0);
    }
}
