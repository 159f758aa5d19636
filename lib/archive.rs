//! `.npz` input from the diagonalization step and output for downstream tools.
//!
//! Output key names and shapes are fixed; see [`write_archive`].

use std::{
    fs::File,
    path::{ Path, PathBuf },
};
use ndarray as nd;
use ndarray_npy::{ NpzReader, ReadableElement };
use num_complex::Complex64 as C64;
use tracing::info;
use crate::{
    error::{ Error, Result },
    labels::LabelSpace,
    pipeline::Precomputed,
    sampler::{ FieldData, FieldGrid },
    transitions::TransitionGraph,
    write_npz,
};

/// Run identifier used as the archive's file stem.
pub fn settings_string(molecule: &str, n_max: u32) -> String {
    format!("{}NMax{}", molecule, n_max)
}

/// `<outdir>/<settings>.npz`
pub fn archive_path<P>(outdir: P, settings: &str) -> PathBuf
where P: AsRef<Path>
{
    outdir.as_ref().join(format!("{}.npz", settings))
}

fn find_name<'a>(names: &'a [String], name: &str) -> Option<&'a str> {
    names.iter()
        .find(|k| {
            k.as_str() == name
                || k.strip_suffix(".npy").is_some_and(|s| s == name)
        })
        .map(|k| k.as_str())
}

fn read_optional<A, D>(npz: &mut NpzReader<File>, names: &[String], name: &str)
    -> Result<Option<nd::Array<A, D>>>
where
    A: ReadableElement,
    D: nd::Dimension,
{
    match find_name(names, name) {
        Some(stored) => Ok(Some(npz.by_name(stored)?)),
        None => Ok(None),
    }
}

fn read_required<A, D>(npz: &mut NpzReader<File>, names: &[String], name: &str)
    -> Result<nd::Array<A, D>>
where
    A: ReadableElement,
    D: nd::Dimension,
{
    read_optional(npz, names, name)?
        .ok_or_else(|| Error::MissingArray(name.to_string()))
}

/// Load the output of the diagonalization step and check it against the label
/// space.
///
/// Requires `b`, `energies`, `couplings_zero`, `couplings_plus` and
/// `couplings_minus`; `states` and `hz` are attached when both are present.
pub fn load_field_data<P>(path: P, labels: &LabelSpace) -> Result<FieldData>
where P: AsRef<Path>
{
    let path = path.as_ref();
    let mut npz = NpzReader::new(File::open(path)?)?;
    let names = npz.names()?;
    let b: nd::Array1<f64> = read_required(&mut npz, &names, "b")?;
    let energies: nd::Array2<f64> = read_required(&mut npz, &names, "energies")?;
    let couplings: [nd::Array3<f64>; 3] = [
        read_required(&mut npz, &names, "couplings_zero")?,
        read_required(&mut npz, &names, "couplings_plus")?,
        read_required(&mut npz, &names, "couplings_minus")?,
    ];
    let data = FieldData::new(labels, FieldGrid::new(b)?, energies, couplings)?;
    let states: Option<nd::Array3<C64>>
        = read_optional(&mut npz, &names, "states")?;
    let hz: Option<nd::Array2<C64>> = read_optional(&mut npz, &names, "hz")?;
    info!(
        path = %path.display(),
        fields = data.num_fields(),
        eigenstates = states.is_some() && hz.is_some(),
        "loaded field data"
    );
    match (states, hz) {
        (Some(states), Some(hz)) => data.with_eigenstates(states, hz),
        _ => Ok(data),
    }
}

fn as_i64(a: &nd::Array2<usize>) -> nd::Array2<i64> { a.mapv(|x| x as i64) }

/// Write every output table of a run to a compressed `.npz` archive.
pub fn write_archive<P>(
    path: P,
    labels: &LabelSpace,
    graph: &TransitionGraph,
    data: &FieldData,
    pre: &Precomputed,
) -> Result<()>
where P: AsRef<Path>
{
    let path = path.as_ref();
    let initial: nd::Array1<i64>
        = pre.initial.iter().map(|k| *k as i64).collect();
    let moments = data.magnetic_moments();
    write_npz!(
        path,
        arrays: {
            "b" => pre.grid.values(),
            "energies" => data.energies(),
            "uncoupled_labels_d" => &labels.uncoupled_table(),
            "labels_d" => &labels.label_table(),
            "labels_degeneracy" => &as_i64(labels.degeneracy_table()),
            "state_jump_list" => &as_i64(labels.jump_table()),
            "transition_labels_d" => &graph.label_table(),
            "transition_indices" => &graph.index_table(),
            "edge_jump_list" => &as_i64(graph.offset_table()),
            "couplings_sparse" => &pre.couplings,
            "pair_resonance" => &pre.resonance,
            "transition_gate_times_unpol" => &pre.unpolarized.gate_times,
            "transition_gate_times_pol" => &pre.polarized.gate_times,
            "cumulative_unpol_time_from_initials" => &pre.unpolarized.cumulative,
            "predecessor_unpol_time_from_initials" => &pre.unpolarized.predecessor,
            "cumulative_pol_time_from_initials" => &pre.polarized.cumulative,
            "predecessor_pol_time_from_initials" => &pre.polarized.predecessor,
            "initial_state_indices" => &initial,
            "failed_field_indices" => &pre.failed_indices(),
        },
        optional: {
            "states" => data.eigenstates().map(|eig| eig.states()),
            "magnetic_moments" => moments.as_ref(),
        }
    )?;
    info!(path = %path.display(), "wrote archive");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        pipeline::precompute,
        sampler::test::synthetic,
        spin::SpinTotal,
        transitions::Polarization,
    };

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("diatom-gates-{}-{}", name, std::process::id()));
        crate::mkdir!(&dir).unwrap();
        dir
    }

    fn space() -> LabelSpace {
        LabelSpace::new(1, SpinTotal::new(1), SpinTotal::new(1))
    }

    fn write_input(path: &Path, data: &FieldData, skip_minus: bool) {
        let zero = data.couplings_dense(Polarization::Pi);
        let plus = data.couplings_dense(Polarization::SigmaPlus);
        let minus = data.couplings_dense(Polarization::SigmaMinus);
        write_npz!(
            path,
            arrays: {
                "b" => data.grid().values(),
                "energies" => data.energies(),
                "couplings_zero" => zero,
                "couplings_plus" => plus,
            },
            optional: {
                "couplings_minus" => (!skip_minus).then_some(minus),
            }
        )
        .unwrap();
    }

    #[test]
    fn settings_name_the_archive() {
        assert_eq!(settings_string("Rb87Cs133", 3), "Rb87Cs133NMax3");
        assert_eq!(
            archive_path("out", "Rb87Cs133NMax3"),
            PathBuf::from("out").join("Rb87Cs133NMax3.npz"),
        );
    }

    #[test]
    fn input_loads_and_checks_shapes() {
        let dir = scratch("input");
        let labels = space();
        let data = synthetic(&labels, 3);
        let path = dir.join("input.npz");
        write_input(&path, &data, false);
        let loaded = load_field_data(&path, &labels).unwrap();
        assert_eq!(loaded.energies(), data.energies());
        assert_eq!(loaded.grid(), data.grid());
        assert!(loaded.eigenstates().is_none());

        let wrong = LabelSpace::new(2, SpinTotal::new(1), SpinTotal::new(1));
        assert!(matches!(
            load_field_data(&path, &wrong),
            Err(Error::Shape { name: "energies", .. }),
        ));

        let path = dir.join("partial.npz");
        write_input(&path, &data, true);
        assert!(matches!(
            load_field_data(&path, &labels),
            Err(Error::MissingArray(name)) if name == "couplings_minus",
        ));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn archive_has_every_table() {
        let dir = scratch("output");
        let labels = space();
        let graph = TransitionGraph::new(&labels);
        let data = synthetic(&labels, 2);
        let pre = precompute(&graph, &data, &[0], 1.054571817e-34);
        let path = archive_path(&dir, &settings_string("Test", 1));
        write_archive(&path, &labels, &graph, &data, &pre).unwrap();

        let mut npz = NpzReader::new(File::open(&path).unwrap()).unwrap();
        let names = npz.names().unwrap();
        for key in [
            "b", "energies", "uncoupled_labels_d", "labels_d",
            "labels_degeneracy", "state_jump_list", "transition_labels_d",
            "transition_indices", "edge_jump_list", "couplings_sparse",
            "pair_resonance", "transition_gate_times_unpol",
            "transition_gate_times_pol", "cumulative_unpol_time_from_initials",
            "predecessor_unpol_time_from_initials",
            "cumulative_pol_time_from_initials",
            "predecessor_pol_time_from_initials", "initial_state_indices",
            "failed_field_indices",
        ] {
            assert!(find_name(&names, key).is_some(), "missing {}", key);
        }
        assert!(find_name(&names, "states").is_none());
        assert!(find_name(&names, "magnetic_moments").is_none());

        let gt: nd::Array2<f64>
            = read_required(&mut npz, &names, "transition_gate_times_pol").unwrap();
        assert_eq!(gt, pre.polarized.gate_times);
        let pred: nd::Array2<i64>
            = read_required(&mut npz, &names, "predecessor_unpol_time_from_initials")
            .unwrap();
        assert_eq!(pred.shape(), [labels.num_states(), 2]);
        assert_eq!(pred[[0, 0]], crate::planner::NO_PREDECESSOR);
        let failed: nd::Array1<i64>
            = read_required(&mut npz, &names, "failed_field_indices").unwrap();
        assert!(failed.is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }
}
