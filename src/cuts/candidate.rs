//! The working form of a cut while a heuristic operates on it.
//!
//! A candidate expresses a base row over nonnegative "terms": each term is
//! either a complemented variable or a row slack, shifted so its domain starts
//! at zero and its coefficient is positive. Heuristics round the candidate;
//! afterwards [`CutCandidate::into_derived_row`] undoes the complementing and
//! substitutes slack terms back into combinations of the original rows.

use crate::accumulator::CutData;
use crate::accumulator::RowAccumulator;
use crate::math::checked_ops;
use crate::propagation::DerivedRow;
use crate::propagation::VariableId;
use crate::rows::ColumnIndex;
use crate::rows::RowId;
use crate::rows::RowStore;
use crate::rows::NEGATIVE_INFINITY;

/// What a candidate term stands for in the original problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TermSource {
    Variable(VariableId),
    /// The upper slack `ub - sum coeff * var` of a stored row.
    UpperSlack(RowId),
}

/// How the term was shifted into its nonnegative form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Complement {
    /// `term = x - base`; coefficient sign was already positive.
    FromLower(i64),
    /// `term = base - x`; flips a negative coefficient positive.
    FromUpper(i64),
}

#[derive(Clone, Debug)]
pub(crate) struct CutTerm {
    pub(crate) source: TermSource,
    /// Always positive.
    pub(crate) coefficient: i64,
    /// Value of the shifted term at the current LP solution.
    pub(crate) lp_value: f64,
    /// Upper bound of the shifted term; zero means the term is fixed.
    pub(crate) range: i64,
    complement: Complement,
}

/// A nonnegative-form inequality `sum coefficient * term <= upper_bound`.
#[derive(Clone, Debug)]
pub(crate) struct CutCandidate {
    pub(crate) terms: Vec<CutTerm>,
    pub(crate) upper_bound: i64,
}

impl CutCandidate {
    /// Complements an extracted row combination into nonnegative form, using
    /// the level-zero bounds attached to each term. Fixed terms are folded
    /// into the bound and dropped.
    ///
    /// Returns [`None`] when a bound shift overflows; the cut is discarded.
    pub(crate) fn from_cut_data(data: &CutData) -> Option<CutCandidate> {
        let mut upper_bound = data.upper_bound;
        let mut terms = Vec::with_capacity(data.terms.len());
        for term in &data.terms {
            let range = term.level_zero_upper.checked_sub(term.level_zero_lower)?;
            if range == 0 {
                // Fixed: move coefficient * value into the bound.
                let contribution =
                    checked_ops::checked_mul(term.coefficient, term.level_zero_lower)?;
                upper_bound = upper_bound.checked_sub(contribution)?;
                continue;
            }
            let (coefficient, lp_value, complement) = if term.coefficient > 0 {
                let shift = checked_ops::checked_mul(term.coefficient, term.level_zero_lower)?;
                upper_bound = upper_bound.checked_sub(shift)?;
                (
                    term.coefficient,
                    term.lp_value - term.level_zero_lower as f64,
                    Complement::FromLower(term.level_zero_lower),
                )
            } else {
                let shift = checked_ops::checked_mul(term.coefficient, term.level_zero_upper)?;
                upper_bound = upper_bound.checked_sub(shift)?;
                (
                    -term.coefficient,
                    term.level_zero_upper as f64 - term.lp_value,
                    Complement::FromUpper(term.level_zero_upper),
                )
            };
            terms.push(CutTerm {
                source: TermSource::Variable(term.variable),
                coefficient,
                lp_value,
                range,
                complement,
            });
        }
        Some(CutCandidate { terms, upper_bound })
    }

    /// Appends an upper-slack term `0 <= ub - activity <= range` of a row
    /// already entering the base combination.
    pub(crate) fn push_upper_slack(
        &mut self,
        row: RowId,
        coefficient: i64,
        lp_slack: f64,
        range: i64,
    ) {
        self.terms.push(CutTerm {
            source: TermSource::UpperSlack(row),
            coefficient,
            lp_value: lp_slack,
            range,
            complement: Complement::FromLower(0),
        });
    }

    /// How far the current LP point violates the candidate; positive means
    /// the candidate cuts off the LP solution.
    pub(crate) fn violation(&self) -> f64 {
        let activity: f64 = self
            .terms
            .iter()
            .map(|term| term.coefficient as f64 * term.lp_value)
            .sum();
        activity - self.upper_bound as f64
    }

    /// Converts back to the original variable space: undoes the term shifts
    /// and substitutes every slack term by its defining row. The result is
    /// normalised by the accumulator's extraction.
    ///
    /// Returns [`None`] on overflow or when nothing remains.
    pub(crate) fn into_derived_row(
        self,
        store: &RowStore,
        accumulator: &mut RowAccumulator,
        width: usize,
        column_to_variable: &[VariableId],
        variable_to_column: impl Fn(VariableId) -> ColumnIndex,
    ) -> Option<DerivedRow> {
        accumulator.clear_and_resize(width);
        let mut upper_bound = self.upper_bound;

        for term in self.terms {
            match (term.source, term.complement) {
                (TermSource::Variable(variable), Complement::FromLower(base)) => {
                    if !accumulator.add(variable_to_column(variable), term.coefficient) {
                        return None;
                    }
                    upper_bound = checked_ops::checked_mul_add(
                        term.coefficient,
                        base,
                        upper_bound,
                    )?;
                }
                (TermSource::Variable(variable), Complement::FromUpper(base)) => {
                    let negated = term.coefficient.checked_neg()?;
                    if !accumulator.add(variable_to_column(variable), negated) {
                        return None;
                    }
                    upper_bound = checked_ops::checked_mul_add(negated, base, upper_bound)?;
                }
                (TermSource::UpperSlack(row), _) => {
                    // coefficient * (ub - sum coeff * var) expands into the
                    // combination with a negated multiplier.
                    let (columns, coefficients) = store.terms(row);
                    let negated = term.coefficient.checked_neg()?;
                    if !accumulator.add_scaled_row(negated, columns, coefficients) {
                        return None;
                    }
                    upper_bound = checked_ops::checked_mul_add(
                        negated,
                        store.upper_bound(row),
                        upper_bound,
                    )?;
                }
            }
        }

        let constraint =
            accumulator.to_linear_constraint(column_to_variable, upper_bound, None)?;
        Some(DerivedRow {
            terms: constraint.terms,
            lower_bound: NEGATIVE_INFINITY,
            upper_bound: constraint.upper_bound,
        })
    }
}
