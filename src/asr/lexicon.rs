//! Pronunciation prefix trie.
//!
//! Every lexicon word is inserted as a path of phone-id edges from the
//! root; word ids hang off the node where their pronunciation ends. The
//! decoder walks this trie frame by frame, so words sharing a prefix
//! share beam hypotheses until their pronunciations diverge.

use crate::model::Model;

#[derive(Debug, Default)]
struct Node {
    /// Outgoing edges, sorted by phone id.
    edges: Vec<(usize, usize)>,
    /// Words whose pronunciation ends here.
    words: Vec<usize>,
}

#[derive(Debug)]
pub struct Lexicon {
    nodes: Vec<Node>,
}

impl Lexicon {
    pub const ROOT: usize = 0;

    /// Builds the trie from the model's pronunciations.
    pub fn build(model: &Model) -> Self {
        let mut nodes = vec![Node::default()];

        for word_id in 0..model.n_words() {
            let mut node = Self::ROOT;
            for &phone in model.pronunciation(word_id) {
                node = match nodes[node].edges.binary_search_by_key(&phone, |e| e.0) {
                    Ok(i) => nodes[node].edges[i].1,
                    Err(i) => {
                        let child = nodes.len();
                        nodes.push(Node::default());
                        nodes[node].edges.insert(i, (phone, child));
                        child
                    }
                };
            }
            nodes[node].words.push(word_id);
        }

        Self { nodes }
    }

    /// Outgoing `(phone, child)` edges of a node, sorted by phone id.
    pub fn children(&self, node: usize) -> &[(usize, usize)] {
        &self.nodes[node].edges
    }

    /// Words completed at this node.
    pub fn words_at(&self, node: usize) -> &[usize] {
        &self.nodes[node].words
    }

    /// Whether the node has outgoing edges, i.e. some longer word
    /// continues through it.
    pub fn has_children(&self, node: usize) -> bool {
        !self.nodes[node].edges.is_empty()
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AcousticParams, FeatureParams, LanguageModel, LexiconEntry, Model, ModelFile,
        FORMAT_VERSION,
    };
    use std::collections::HashMap;

    fn prefix_model() -> Model {
        // "we" is a full prefix of "welcome"
        let phones: Vec<String> = ["w", "e", "l", "c", "o", "m", "sil"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let n_symbols = phones.len() + 1;
        let entry = |word: &str, phones: &[&str]| LexiconEntry {
            word: word.to_string(),
            phones: phones.iter().map(|s| s.to_string()).collect(),
        };
        let file = ModelFile {
            name: "prefix".to_string(),
            format_version: FORMAT_VERSION,
            sample_rate: 16000,
            frame_length: 512,
            features: FeatureParams { n_mels: 4 },
            phones,
            silence_phone: "sil".to_string(),
            acoustic: AcousticParams {
                weights: vec![vec![0.0; 4]; n_symbols],
                bias: vec![0.0; n_symbols],
            },
            lexicon: vec![
                entry("we", &["w", "e"]),
                entry("welcome", &["w", "e", "l", "c", "o", "m", "e"]),
                entry("low", &["l", "o", "w"]),
            ],
            lm: LanguageModel {
                weight: 1.0,
                unigrams: HashMap::new(),
                bigrams: HashMap::new(),
            },
        };
        Model::compile(file).unwrap()
    }

    #[test]
    fn shared_prefixes_share_nodes() {
        let model = prefix_model();
        let trie = Lexicon::build(&model);

        // "we" + "welcome" share w-e (2 nodes), then 5 more for "lcome",
        // then 3 for "low", plus the root
        assert_eq!(trie.n_nodes(), 1 + 2 + 5 + 3);
    }

    #[test]
    fn word_ends_at_interior_node() {
        let model = prefix_model();
        let trie = Lexicon::build(&model);
        let w = model.phone_id("w").unwrap();
        let e = model.phone_id("e").unwrap();

        let n1 = trie
            .children(Lexicon::ROOT)
            .iter()
            .find(|&&(p, _)| p == w)
            .map(|&(_, c)| c)
            .unwrap();
        let n2 = trie
            .children(n1)
            .iter()
            .find(|&&(p, _)| p == e)
            .map(|&(_, c)| c)
            .unwrap();

        // "we" completes here but "welcome" continues through
        assert_eq!(trie.words_at(n2), &[model.word_id("we").unwrap()]);
        assert!(trie.has_children(n2));
    }

    #[test]
    fn edges_sorted_by_phone() {
        let model = prefix_model();
        let trie = Lexicon::build(&model);
        for node in 0..trie.n_nodes() {
            let edges = trie.children(node);
            for pair in edges.windows(2) {
                assert!(pair[0].0 < pair[1].0);
            }
        }
    }

    #[test]
    fn root_has_one_edge_per_distinct_first_phone() {
        let model = prefix_model();
        let trie = Lexicon::build(&model);
        // first phones: w (we, welcome), l (low)
        assert_eq!(trie.children(Lexicon::ROOT).len(), 2);
    }
}
