//! Pairwise alignment of templates.
//!
//! A template is a flat list of literal tokens and gaps. Two templates are
//! aligned on their longest common subsequence of literals; the literals
//! kept become anchors and every maximal run of unmatched elements between
//! two anchors becomes a single gap of the merged template.
//!
//! Literals are tokens when examples are grouped, and rule symbols (tokens or
//! category references) when productions are aligned again after merging.

/// Element of a template under construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Element<T> {
	Literal(T),
	Gap,
}

impl<T: PartialEq> Element<T> {
	fn matches(&self, other: &Element<T>) -> bool {
		matches!((self, other), (Element::Literal(a), Element::Literal(b)) if a == b)
	}
}

/// Counts the literal elements of a template.
pub(crate) fn literal_count<T>(elements: &[Element<T>]) -> usize {
	elements.iter().filter(|e| matches!(e, Element::Literal(_))).count()
}

/// One column of an alignment, referring to element indices of both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Column<T> {
	Anchor { token: T, left: usize, right: usize },
	Gap { left: Vec<usize>, right: Vec<usize> },
}

impl<T> Column<T> {
	fn has_empty_side(&self) -> bool {
		matches!(self, Column::Gap { left, right } if left.is_empty() || right.is_empty())
	}
}

/// Alignment of a left and a right template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Alignment<T> {
	columns: Vec<Column<T>>,
}

/// Side of an alignment a member belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
	Left,
	Right,
}

impl<T: Clone + PartialEq> Alignment<T> {
	/// Aligns two templates on their longest common subsequence of literals.
	///
	/// When several alignments have the same length, matching as early as
	/// possible wins, then skipping left elements before right ones.
	pub(crate) fn new(left: &[Element<T>], right: &[Element<T>]) -> Self {
		let n = left.len();
		let m = right.len();

		// lcs[i][j] = LCS length of left[i..] and right[j..]
		let mut lcs = vec![vec![0usize; m + 1]; n + 1];
		for i in (0..n).rev() {
			for j in (0..m).rev() {
				lcs[i][j] = if left[i].matches(&right[j]) {
					lcs[i + 1][j + 1] + 1
				} else {
					lcs[i + 1][j].max(lcs[i][j + 1])
				};
			}
		}

		let mut columns = Vec::new();
		let mut pending_left = Vec::new();
		let mut pending_right = Vec::new();
		let (mut i, mut j) = (0, 0);

		while i < n || j < m {
			if i < n && j < m && left[i].matches(&right[j]) {
				flush_gap(&mut columns, &mut pending_left, &mut pending_right);
				if let Element::Literal(token) = &left[i] {
					columns.push(Column::Anchor { token: token.clone(), left: i, right: j });
				}
				i += 1;
				j += 1;
			} else if j >= m || (i < n && lcs[i + 1][j] >= lcs[i][j + 1]) {
				pending_left.push(i);
				i += 1;
			} else {
				pending_right.push(j);
				j += 1;
			}
		}
		flush_gap(&mut columns, &mut pending_left, &mut pending_right);

		Self { columns }
	}

	/// Widens gaps that are empty on one side by absorbing their neighbour
	/// anchor (the following one, else the preceding one), until no gap has
	/// an empty side or no anchor is left to absorb.
	pub(crate) fn without_empty_gaps(mut self) -> Self {
		while let Some(g) = self.columns.iter().position(Column::has_empty_side) {
			// Gaps are never adjacent: the neighbours of a gap are anchors.
			if g + 1 < self.columns.len() {
				let end = if self.is_gap(g + 2) { g + 2 } else { g + 1 };
				self.absorb(g, end);
			} else if g > 0 {
				let start = if g >= 2 && self.is_gap(g - 2) { g - 2 } else { g - 1 };
				self.absorb(start, g);
			} else {
				break;
			}
		}
		self
	}

	/// Splits every gap filled on both sides into one gap per substituted
	/// element pair; the last gap also takes the extra elements of the
	/// longer side.
	///
	/// Run after `without_empty_gaps`, which expects gaps to be isolated.
	pub(crate) fn one_gap_per_substitution(self) -> Self {
		let columns = self
			.columns
			.into_iter()
			.flat_map(|column| match column {
				Column::Gap { left, right } if left.len() > 1 && right.len() > 1 => {
					let pairs = left.len().min(right.len());
					(0..pairs)
						.map(|k| {
							if k + 1 == pairs {
								Column::Gap {
									left: left[k..].to_vec(),
									right: right[k..].to_vec(),
								}
							} else {
								Column::Gap {
									left: vec![left[k]],
									right: vec![right[k]],
								}
							}
						})
						.collect::<Vec<_>>()
				}
				other => vec![other],
			})
			.collect();
		Self { columns }
	}

	fn is_gap(&self, index: usize) -> bool {
		matches!(self.columns.get(index), Some(Column::Gap { .. }))
	}

	/// Collapses columns `start..=end` into one gap.
	fn absorb(&mut self, start: usize, end: usize) {
		let mut left = Vec::new();
		let mut right = Vec::new();
		for column in self.columns.drain(start..=end) {
			match column {
				Column::Anchor { left: l, right: r, .. } => {
					left.push(l);
					right.push(r);
				}
				Column::Gap { left: l, right: r } => {
					left.extend(l);
					right.extend(r);
				}
			}
		}
		self.columns.insert(start, Column::Gap { left, right });
	}

	pub(crate) fn anchors(&self) -> usize {
		self.columns.iter().filter(|c| matches!(c, Column::Anchor { .. })).count()
	}

	pub(crate) fn has_empty_gap(&self) -> bool {
		self.columns.iter().any(Column::has_empty_side)
	}

	/// Template generalizing both sides.
	pub(crate) fn merged(&self) -> Vec<Element<T>> {
		self.columns
			.iter()
			.map(|column| match column {
				Column::Anchor { token, .. } => Element::Literal(token.clone()),
				Column::Gap { .. } => Element::Gap,
			})
			.collect()
	}

	/// Re-segments a member of one side against the merged template.
	///
	/// `segments[k]` is the token span the member gives to element `k` of its
	/// old template; the result is parallel to `merged()`.
	pub(crate) fn project<S: Clone>(&self, side: Side, segments: &[Vec<S>]) -> Vec<Vec<S>> {
		self.columns
			.iter()
			.map(|column| match (column, side) {
				(Column::Anchor { left, .. }, Side::Left) => segments[*left].clone(),
				(Column::Anchor { right, .. }, Side::Right) => segments[*right].clone(),
				(Column::Gap { left, .. }, Side::Left) => concat(segments, left),
				(Column::Gap { right, .. }, Side::Right) => concat(segments, right),
			})
			.collect()
	}
}

fn flush_gap<T>(columns: &mut Vec<Column<T>>, left: &mut Vec<usize>, right: &mut Vec<usize>) {
	if left.is_empty() && right.is_empty() {
		return;
	}
	columns.push(Column::Gap {
		left: std::mem::take(left),
		right: std::mem::take(right),
	});
}

fn concat<S: Clone>(segments: &[Vec<S>], indices: &[usize]) -> Vec<S> {
	indices.iter().flat_map(|i| segments[*i].iter().cloned()).collect()
}
