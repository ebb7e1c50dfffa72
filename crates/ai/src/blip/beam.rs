/// Beam search over a scorer returning next-token log probabilities for a sequence.
///
/// `max_length` bounds the whole sequence, prompt included.
#[derive(Debug, Clone)]
pub struct BeamSearch {
    pub num_beams: usize,
    pub max_length: usize,
    pub eos_token_id: u32,
    pub length_penalty: f64,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    log_prob: f64,
}

impl BeamSearch {
    pub fn new(num_beams: usize, max_length: usize, eos_token_id: u32) -> Self {
        Self {
            num_beams: num_beams.max(1),
            max_length,
            eos_token_id,
            length_penalty: 1.0,
        }
    }

    fn score(&self, log_prob: f64, generated: usize) -> f64 {
        log_prob / (generated.max(1) as f64).powf(self.length_penalty)
    }

    /// Returns the best sequence, prompt included and EOS excluded.
    pub fn run<F>(&self, prompt: &[u32], mut next_log_probs: F) -> anyhow::Result<Vec<u32>>
    where
        F: FnMut(&[u32]) -> anyhow::Result<Vec<f32>>,
    {
        let num_beams = self.num_beams.max(1);
        let mut beams = vec![Hypothesis {
            tokens: prompt.to_vec(),
            log_prob: 0.0,
        }];
        // (tokens, score)
        let mut finished: Vec<(Vec<u32>, f64)> = vec![];

        for _ in prompt.len()..self.max_length {
            let mut candidates = vec![];
            for (beam_idx, beam) in beams.iter().enumerate() {
                let log_probs = next_log_probs(&beam.tokens)?;
                for (token, log_prob) in top_k(&log_probs, 2 * num_beams) {
                    candidates.push((beam_idx, token, beam.log_prob + log_prob as f64));
                }
            }
            candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

            let mut next_beams = Vec::with_capacity(num_beams);
            for (rank, (beam_idx, token, log_prob)) in candidates.into_iter().enumerate() {
                let beam = &beams[beam_idx];
                if token == self.eos_token_id {
                    // an EOS outside the top `num_beams` candidates does not finish a beam
                    if rank < num_beams {
                        let generated = beam.tokens.len() + 1 - prompt.len();
                        finished.push((beam.tokens.clone(), self.score(log_prob, generated)));
                    }
                } else {
                    let mut tokens = beam.tokens.clone();
                    tokens.push(token);
                    next_beams.push(Hypothesis { tokens, log_prob });
                }

                if next_beams.len() == num_beams {
                    break;
                }
            }

            finished.sort_by(|a, b| b.1.total_cmp(&a.1));
            finished.truncate(num_beams);
            beams = next_beams;

            // done as soon as `num_beams` hypotheses have ended
            if beams.is_empty() || finished.len() >= num_beams {
                break;
            }
        }

        if finished.len() < num_beams {
            for beam in beams {
                let generated = beam.tokens.len() - prompt.len();
                finished.push((beam.tokens, self.score(beam.log_prob, generated)));
            }
        }

        Ok(finished
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(tokens, _)| tokens)
            .unwrap_or_else(|| prompt.to_vec()))
    }
}

/// The `k` largest values with their indices, largest first.
fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u32, *v))
        .collect();
    let k = k.min(indexed.len());
    if k == 0 {
        return vec![];
    }
    if k < indexed.len() {
        indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
    }
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}
