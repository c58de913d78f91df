//! Dataset descriptors from explicit axis lists, for when the caller already
//! knows what exists and no walk is needed.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::iter::FusedIterator;

use crate::grammar::DatasetDescriptor;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetAxes {
    /// `(group, model)` pairs; a model is only ever published under one group.
    pub group_models: Vec<(String, String)>,
    pub experiments: Vec<String>,
    pub freqs: Vec<String>,
    pub realms: Vec<String>,
    pub cmor_tables: Vec<String>,
    pub ensembles: Vec<String>,
    pub variables: Vec<String>,
}

impl DatasetAxes {
    fn sizes(&self) -> [usize; 7] {
        [
            self.group_models.len(),
            self.experiments.len(),
            self.freqs.len(),
            self.realms.len(),
            self.cmor_tables.len(),
            self.ensembles.len(),
            self.variables.len(),
        ]
    }

    /// Number of descriptors the product yields.
    pub fn len(&self) -> usize {
        self.sizes().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Product<&DatasetAxes> {
        Product::new(self)
    }
}

impl IntoIterator for DatasetAxes {
    type Item = DatasetDescriptor;
    type IntoIter = Product<DatasetAxes>;

    fn into_iter(self) -> Self::IntoIter {
        Product::new(self)
    }
}

impl<'a> IntoIterator for &'a DatasetAxes {
    type Item = DatasetDescriptor;
    type IntoIter = Product<&'a DatasetAxes>;

    fn into_iter(self) -> Self::IntoIter {
        Product::new(self)
    }
}

/// Lazy Cartesian product over the axes. The last axis (variables) varies fastest.
#[derive(Debug, Clone)]
pub struct Product<A> {
    axes: A,
    odometer: [usize; 7],
    remaining: usize,
}

impl<A: Borrow<DatasetAxes>> Product<A> {
    fn new(axes: A) -> Self {
        let remaining = axes.borrow().len();
        Self {
            axes,
            odometer: [0; 7],
            remaining,
        }
    }
}

impl<A: Borrow<DatasetAxes>> Iterator for Product<A> {
    type Item = DatasetDescriptor;

    fn next(&mut self) -> Option<DatasetDescriptor> {
        if self.remaining == 0 {
            return None;
        }
        let axes = self.axes.borrow();
        let [gm, exp, freq, realm, table, ens, var] = self.odometer;
        let (group, model) = &axes.group_models[gm];
        let item = DatasetDescriptor {
            group: group.clone(),
            model: model.clone(),
            experiment: axes.experiments[exp].clone(),
            freq: axes.freqs[freq].clone(),
            realm: axes.realms[realm].clone(),
            cmor_table: axes.cmor_tables[table].clone(),
            ensemble: axes.ensembles[ens].clone(),
            variable: axes.variables[var].clone(),
        };

        let sizes = axes.sizes();
        for (digit, size) in self.odometer.iter_mut().zip(sizes).rev() {
            *digit += 1;
            if *digit < size {
                break;
            }
            *digit = 0;
        }
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<A: Borrow<DatasetAxes>> ExactSizeIterator for Product<A> {}

impl<A: Borrow<DatasetAxes>> FusedIterator for Product<A> {}

/// Expands the axis lists into one descriptor per combination.
pub fn generate<I, S>(
    group_models: impl IntoIterator<Item = (S, S)>,
    experiments: I,
    freqs: I,
    realms: I,
    cmor_tables: I,
    ensembles: I,
    variables: I,
) -> Product<DatasetAxes>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fn owned<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Vec<String> {
        values.into_iter().map(Into::into).collect()
    }

    DatasetAxes {
        group_models: group_models
            .into_iter()
            .map(|(g, m)| (g.into(), m.into()))
            .collect(),
        experiments: owned(experiments),
        freqs: owned(freqs),
        realms: owned(realms),
        cmor_tables: owned(cmor_tables),
        ensembles: owned(ensembles),
        variables: owned(variables),
    }
    .into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn axes() -> DatasetAxes {
        let v = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        DatasetAxes {
            group_models: vec![
                ("MIROC".into(), "MIROC5".into()),
                ("NCC".into(), "NorESM1-M".into()),
            ],
            experiments: v(&["sstClim", "sstClimAerosol"]),
            freqs: v(&["mon"]),
            realms: v(&["atmos", "aerosol"]),
            cmor_tables: v(&["Amon", "aero", "cfMon"]),
            ensembles: v(&["r1i1p1"]),
            variables: v(&["rlut", "rsut"]),
        }
    }

    #[test]
    fn yields_the_full_product_without_duplicates() {
        let axes = axes();
        assert_eq!(axes.len(), 2 * 2 * 2 * 3 * 2);
        let all: Vec<_> = axes.iter().collect();
        assert_eq!(all.len(), axes.len());
        let unique: BTreeSet<_> = all.iter().cloned().collect();
        assert_eq!(unique.len(), all.len());
        for d in &all {
            assert!(axes.group_models.contains(&(d.group.clone(), d.model.clone())));
            assert!(axes.cmor_tables.contains(&d.cmor_table));
        }
    }

    #[test]
    fn last_axis_varies_fastest() {
        let all: Vec<_> = axes().into_iter().take(3).collect();
        assert_eq!(all[0].variable, "rlut");
        assert_eq!(all[1].variable, "rsut");
        assert_eq!(all[2].variable, "rlut");
        assert_eq!(all[2].cmor_table, "aero");
        assert_eq!(all[0].model, "MIROC5");
    }

    #[test]
    fn an_empty_axis_yields_nothing() {
        let mut axes = axes();
        axes.ensembles.clear();
        assert!(axes.is_empty());
        assert_eq!(axes.iter().next(), None);
    }

    #[test]
    fn iterator_reports_exact_size() {
        let mut it = axes().into_iter();
        assert_eq!(it.len(), 48);
        it.next();
        assert_eq!(it.len(), 47);
    }

    #[test]
    fn generate_expands_a_small_campaign() {
        let datasets: Vec<_> = generate(
            [("MIROC", "MIROC5")],
            vec!["sstClim", "sstClimAerosol"],
            vec!["mon"],
            vec!["aerosol"],
            vec!["aero"],
            vec!["r1i1p1"],
            vec!["cldncl", "cldnci"],
        )
        .collect();
        assert_eq!(datasets.len(), 4);
        assert_eq!(datasets[3].experiment, "sstClimAerosol");
        assert_eq!(datasets[3].variable, "cldnci");
    }
}
