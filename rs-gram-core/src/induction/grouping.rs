use std::collections::BTreeMap;

use log::debug;

use super::alignment::{literal_count, Alignment, Element, Side};

/// A group of sequences sharing one template.
///
/// Every member keeps its segmentation: `members[m][k]` is the span member
/// `m` gives to element `k` of the template (one symbol for a literal, any
/// span for a gap).
#[derive(Clone, Debug)]
pub(crate) struct Cluster<T> {
	pub(crate) template: Vec<Element<T>>,
	pub(crate) members: Vec<Vec<Vec<T>>>,
}

impl<T: Clone> Cluster<T> {
	fn from_sequence(sequence: &[T]) -> Self {
		Self {
			template: sequence.iter().cloned().map(Element::Literal).collect(),
			members: vec![sequence.iter().map(|symbol| vec![symbol.clone()]).collect()],
		}
	}
}

/// A possible grouping of two clusters.
#[derive(Clone, Debug)]
struct Candidate<T> {
	alignment: Alignment<T>,
	anchors: usize,
	max_literals: usize,
}

impl<T> Candidate<T> {
	/// Compares `anchors / max_literals` exactly.
	fn beats(&self, other: &Candidate<T>) -> bool {
		self.anchors * other.max_literals > other.anchors * self.max_literals
	}
}

/// Policy deciding which sequences share a template.
///
/// - Every sequence starts as a single-member cluster.
/// - The pair of clusters whose aligned templates keep the highest share of
///   literals is merged first (ties: lowest cluster identifiers), as long as
///   the share reaches `min_template_similarity`.
/// - Without `allow_empty_string`, gaps left empty on one side absorb a
///   neighbouring anchor; a pair that still has one is not grouped.
/// - Without `minimal_variables`, every substituted pair gets its own gap.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Grouping {
	pub(crate) allow_empty_string: bool,
	pub(crate) min_template_similarity: f64,
	pub(crate) minimal_variables: bool,
}

impl Grouping {
	/// Groups distinct sequences; clusters come out in creation order.
	pub(crate) fn cluster<T: Clone + PartialEq>(&self, sequences: &[&Vec<T>]) -> Vec<Cluster<T>> {
		let mut clusters: Vec<Option<Cluster<T>>> = sequences
			.iter()
			.map(|sequence| Some(Cluster::from_sequence(sequence)))
			.collect();

		let mut candidates: BTreeMap<(usize, usize), Candidate<T>> = BTreeMap::new();
		for i in 0..clusters.len() {
			for j in i + 1..clusters.len() {
				if let Some(candidate) = self.candidate(&clusters, i, j) {
					candidates.insert((i, j), candidate);
				}
			}
		}

		loop {
			// BTreeMap order gives the lowest identifiers on equal scores
			let mut best: Option<(&(usize, usize), &Candidate<T>)> = None;
			for entry in &candidates {
				if best.is_none_or(|(_, current)| entry.1.beats(current)) {
					best = Some(entry);
				}
			}
			let Some((&(i, j), _)) = best else { break };
			let Some(candidate) = candidates.remove(&(i, j)) else { break };
			candidates.retain(|&(a, b), _| a != i && a != j && b != i && b != j);

			let (Some(left), Some(right)) = (clusters[i].take(), clusters[j].take()) else {
				break;
			};

			let mut members: Vec<Vec<Vec<T>>> = left
				.members
				.iter()
				.map(|m| candidate.alignment.project(Side::Left, m))
				.collect();
			members.extend(right.members.iter().map(|m| candidate.alignment.project(Side::Right, m)));

			let merged = Cluster {
				template: candidate.alignment.merged(),
				members,
			};
			debug!(
				"grouped templates {} and {} ({}/{} literals kept, {} members)",
				i,
				j,
				candidate.anchors,
				candidate.max_literals,
				merged.members.len()
			);

			clusters.push(Some(merged));
			let new_id = clusters.len() - 1;
			for k in 0..new_id {
				if let Some(candidate) = self.candidate(&clusters, k, new_id) {
					candidates.insert((k, new_id), candidate);
				}
			}
		}

		clusters.into_iter().flatten().collect()
	}

	/// Aligns two active clusters and checks the grouping policy.
	fn candidate<T: Clone + PartialEq>(&self, clusters: &[Option<Cluster<T>>], i: usize, j: usize) -> Option<Candidate<T>> {
		let left = clusters[i].as_ref()?;
		let right = clusters[j].as_ref()?;

		let mut alignment = Alignment::new(&left.template, &right.template);
		if !self.allow_empty_string {
			alignment = alignment.without_empty_gaps();
			if alignment.has_empty_gap() {
				return None;
			}
		}

		let anchors = alignment.anchors();
		let max_literals = literal_count(&left.template).max(literal_count(&right.template));
		if anchors == 0 || (anchors as f64) < self.min_template_similarity * max_literals as f64 {
			return None;
		}

		if !self.minimal_variables {
			alignment = alignment.one_gap_per_substitution();
		}

		Some(Candidate {
			alignment,
			anchors,
			max_literals,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grouping(minimal_variables: bool) -> Grouping {
		Grouping {
			allow_empty_string: false,
			min_template_similarity: 0.3,
			minimal_variables,
		}
	}

	fn sequences(lines: &[&str]) -> Vec<Vec<String>> {
		lines
			.iter()
			.map(|l| l.split_whitespace().map(str::to_owned).collect())
			.collect()
	}

	#[test]
	fn best_pair_first_then_the_rest() {
		let data = sequences(&["the cat sat", "the dog sat", "a cat sat", "a dog sat"]);
		let refs: Vec<&Vec<String>> = data.iter().collect();
		let clusters = grouping(true).cluster(&refs);
		assert_eq!(clusters.len(), 1);
		assert_eq!(clusters[0].template, vec![Element::Gap, Element::Literal("sat".to_owned())]);
		let spans: Vec<Vec<String>> = clusters[0].members.iter().map(|m| m[0].clone()).collect();
		assert_eq!(spans[0], vec!["the".to_owned(), "cat".to_owned()]);
		assert_eq!(spans.len(), 4);
	}

	#[test]
	fn far_sequences_stay_single() {
		let data = sequences(&["red green blue", "one two three"]);
		let refs: Vec<&Vec<String>> = data.iter().collect();
		let clusters = grouping(true).cluster(&refs);
		assert_eq!(clusters.len(), 2);
		assert!(clusters.iter().all(|c| c.members.len() == 1));
	}

	#[test]
	fn extra_variables_on_request() {
		let data = sequences(&["x b c", "x d e"]);
		let refs: Vec<&Vec<String>> = data.iter().collect();
		assert_eq!(grouping(true).cluster(&refs)[0].template.len(), 2);
		assert_eq!(grouping(false).cluster(&refs)[0].template.len(), 3);
	}
}
