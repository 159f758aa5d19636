//! Output helpers shared by the library and the binaries.

/// Create a directory and all of its parents if it does not already exist.
///
/// Evaluates to a [`Result<()>`][crate::error::Result].
#[macro_export]
macro_rules! mkdir {
    ( $dir:expr ) => {
        {
            let dir_: &std::path::Path = $dir.as_ref();
            if dir_.is_dir() {
                Ok(())
            } else {
                std::fs::create_dir_all(dir_)
                    .map_err($crate::error::Error::from)
            }
        }
    }
}

/// Write a set of named arrays to a compressed `.npz` file.
///
/// Entries under `optional` take `Option<&Array>` values and are skipped when
/// `None`. Evaluates to a [`Result<()>`][crate::error::Result].
///
/// ```ignore
/// write_npz!(
///     outdir.join("out.npz"),
///     arrays: {
///         "b" => &b,
///         "energies" => &energies,
///     },
///     optional: {
///         "states" => states.as_ref(),
///     }
/// )?;
/// ```
#[macro_export]
macro_rules! write_npz {
    (
        $filename:expr,
        arrays: { $( $key:expr => $val:expr ),* $(,)? }
        $(, optional: { $( $okey:expr => $oval:expr ),* $(,)? } )?
        $(,)?
    ) => {
        (|| -> $crate::error::Result<()> {
            let mut output_
                = $crate::ndarray_npy::NpzWriter::new_compressed(
                    std::fs::File::create($filename)?
                );
            $(
                output_.add_array($key, $val)?;
            )*
            $($(
                if let Some(arr_) = $oval {
                    output_.add_array($okey, arr_)?;
                }
            )*)?
            output_.finish()?;
            Ok(())
        })()
    }
}
