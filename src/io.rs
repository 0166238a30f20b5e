//! NumPy `.npy` I/O for the decoding pipeline.
//!
//! Reader: parses the arrays written by the source-localization stage
//! (`X_<label>.npy`, `y.npy`, one directory per subject).
//! Writer: persists the `(subjects × timepoints)` accuracy matrix in the
//! same format so downstream tooling can `np.load` it.
//!
//! Only the subset of the format the pipeline produces/consumes is
//! implemented: version 1.x/2.x headers, C-order, little-endian
//! `f8`/`f4`/`i8`/`i4` payloads.
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Array3};
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

// ── Low-level header parser (the header is a Python dict literal, not JSON,
//    so it is scanned by hand rather than with serde_json). ──────────────────

fn parse_header(bytes: &[u8]) -> Result<(String, bool, Vec<usize>, usize)> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        bail!("not an .npy file (bad magic)");
    }
    let (major, _minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => (
            u16::from_le_bytes([bytes[8], bytes[9]]) as usize,
            10usize,
        ),
        2 | 3 => {
            if bytes.len() < 12 {
                bail!(".npy v{major} header truncated");
            }
            (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12usize,
            )
        }
        v => bail!("unsupported .npy version {v}"),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        bail!(".npy header truncated: need {data_start} bytes, have {}", bytes.len());
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .context(".npy header is not valid UTF-8")?;

    let descr = str_field(header, "descr").context("missing 'descr' in .npy header")?;
    let fortran = bool_field(header, "fortran_order")
        .context("missing 'fortran_order' in .npy header")?;
    let shape = shape_field(header).context("missing 'shape' in .npy header")?;

    Ok((descr, fortran, shape, data_start))
}

/// Extract `'key': '<value>'` from the dict literal.
fn str_field(header: &str, key: &str) -> Option<String> {
    let pos = header.find(&format!("'{key}'"))?;
    let rest = &header[pos..];
    let open = rest.find(": '")? + 3;
    let close = rest[open..].find('\'')? + open;
    Some(rest[open..close].to_string())
}

/// Extract `'key': True/False` from the dict literal.
fn bool_field(header: &str, key: &str) -> Option<bool> {
    let pos = header.find(&format!("'{key}'"))?;
    let rest = &header[pos..];
    let t = rest.find(": True");
    let f = rest.find(": False");
    match (t, f) {
        (Some(ti), Some(fi)) => Some(ti < fi),
        (Some(_), None) => Some(true),
        (None, Some(_)) => Some(false),
        (None, None) => None,
    }
}

/// Extract `'shape': (a, b, …)` from the dict literal.
fn shape_field(header: &str) -> Option<Vec<usize>> {
    let pos = header.find("'shape'")?;
    let rest = &header[pos..];
    let open = rest.find('(')? + 1;
    let close = rest[open..].find(')')? + open;
    let inner = &rest[open..close];
    let mut shape = Vec::new();
    for tok in inner.split(',') {
        let tok = tok.trim();
        if tok.is_empty() {
            continue; // trailing comma of 1-tuples
        }
        shape.push(tok.parse().ok()?);
    }
    Some(shape)
}

fn decode_payload(descr: &str, raw: &[u8]) -> Result<Vec<f64>> {
    let vals: Vec<f64> = match descr {
        "<f8" => raw
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
            .collect(),
        "<f4" => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()) as f64)
            .collect(),
        "<i8" => raw
            .chunks_exact(8)
            .map(|b| i64::from_le_bytes(b.try_into().unwrap()) as f64)
            .collect(),
        "<i4" => raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes(b.try_into().unwrap()) as f64)
            .collect(),
        other => bail!("unsupported .npy dtype '{other}' (expected <f8/<f4/<i8/<i4)"),
    };
    Ok(vals)
}

// ── Public readers ────────────────────────────────────────────────────────────

/// Read an `.npy` file into a flat `f64` buffer plus its shape.
///
/// Integer payloads are widened to `f64`; Fortran-order files are rejected
/// (numpy only writes them for explicitly transposed arrays, which the
/// upstream pipeline never does).
pub fn read_npy(path: &Path) -> Result<(Vec<f64>, Vec<usize>)> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (descr, fortran, shape, data_start) = parse_header(&bytes)?;
    if fortran {
        bail!("{}: fortran_order arrays are not supported", path.display());
    }
    let vals = decode_payload(&descr, &bytes[data_start..])
        .with_context(|| format!("decoding {}", path.display()))?;
    let expected: usize = shape.iter().product();
    if vals.len() != expected {
        bail!(
            "{}: payload has {} elements, header shape {:?} implies {}",
            path.display(),
            vals.len(),
            shape,
            expected
        );
    }
    Ok((vals, shape))
}

/// Read a 1-D `.npy` file (e.g. a trigger/label vector).
pub fn read_npy_1d(path: &Path) -> Result<Array1<f64>> {
    let (vals, shape) = read_npy(path)?;
    if shape.len() != 1 {
        bail!("{}: expected 1-D array, got shape {:?}", path.display(), shape);
    }
    Ok(Array1::from_vec(vals))
}

/// Read a 2-D `.npy` file (e.g. an accuracy matrix).
pub fn read_npy_2d(path: &Path) -> Result<Array2<f64>> {
    let (vals, shape) = read_npy(path)?;
    if shape.len() != 2 {
        bail!("{}: expected 2-D array, got shape {:?}", path.display(), shape);
    }
    Ok(Array2::from_shape_vec((shape[0], shape[1]), vals)?)
}

/// Read a 3-D `.npy` file (trial × source × time data).
pub fn read_npy_3d(path: &Path) -> Result<Array3<f64>> {
    let (vals, shape) = read_npy(path)?;
    if shape.len() != 3 {
        bail!("{}: expected 3-D array, got shape {:?}", path.display(), shape);
    }
    Ok(Array3::from_shape_vec((shape[0], shape[1], shape[2]), vals)?)
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Write a C-order `<f8` array as `.npy` version 1.0.
///
/// The header is padded with spaces so the payload starts on a 64-byte
/// boundary, exactly as `np.save` does.
pub fn write_npy(path: &Path, data: &[f64], shape: &[usize]) -> Result<()> {
    use std::io::Write;

    let expected: usize = shape.iter().product();
    if data.len() != expected {
        bail!("shape {:?} implies {} elements, got {}", shape, expected, data.len());
    }

    let shape_str = match shape.len() {
        1 => format!("({},)", shape[0]),
        _ => format!(
            "({})",
            shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f8', 'fortran_order': False, 'shape': {shape_str}, }}");
    // magic(6) + version(2) + header_len(2) + header + '\n' must be % 64 == 0.
    let unpadded = 10 + header.len() + 1;
    let pad = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(pad));
    header.push('\n');

    let mut f = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    f.write_all(MAGIC)?;
    f.write_all(&[1u8, 0u8])?;
    f.write_all(&(header.len() as u16).to_le_bytes())?;
    f.write_all(header.as_bytes())?;
    for v in data {
        f.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Write a 2-D array (e.g. the accuracy matrix) as `.npy`.
pub fn write_npy_arr2(path: &Path, arr: &Array2<f64>) -> Result<()> {
    let data: Vec<f64> = arr.iter().copied().collect();
    write_npy(path, &data, &[arr.nrows(), arr.ncols()])
}
