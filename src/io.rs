//! Particle file I/O, grounded on `sph.cpp`'s `setup_particles` /
//! `output_particles`: whitespace-separated `pos... type` rows.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use thiserror::Error;

use crate::config::Config;
use crate::geometry::{Real, RVec, DIM};
use crate::particle::{Particle, ParticleKind};

#[derive(Debug, Error)]
pub enum SphError {
    #[error("failed to read particle file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed particle record at line {line_no}: {text:?}")]
    MalformedLine { line_no: usize, text: String },
    #[error("unknown particle type {value} at line {line_no}")]
    InvalidParticleType { line_no: usize, value: i64 },
}

/// Loads particles from a file of `DIM` position columns followed by an
/// integer type column (`1` fluid, `2` wall), one particle per line.
pub fn load_particles(path: impl AsRef<Path>, config: &Config) -> Result<Vec<Particle>, SphError> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut particles = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != DIM + 1 {
            return Err(SphError::MalformedLine {
                line_no,
                text: line.to_string(),
            });
        }

        let parse_real = |s: &str| -> Result<Real, SphError> {
            s.parse::<Real>().map_err(|_| SphError::MalformedLine {
                line_no,
                text: line.to_string(),
            })
        };

        #[cfg(not(feature = "dim3"))]
        let pos = RVec::new(parse_real(fields[0])?, parse_real(fields[1])?);
        #[cfg(feature = "dim3")]
        let pos = RVec::new(
            parse_real(fields[0])?,
            parse_real(fields[1])?,
            parse_real(fields[2])?,
        );

        let type_code: i64 = fields[DIM]
            .parse()
            .map_err(|_| SphError::MalformedLine {
                line_no,
                text: line.to_string(),
            })?;
        let kind = ParticleKind::from_code(type_code).ok_or(SphError::InvalidParticleType {
            line_no,
            value: type_code,
        })?;

        particles.push(Particle::init(pos, kind, config));
    }

    Ok(particles)
}

/// Writes `pos... type` rows, matching `output_particles`'s format exactly
/// so result files can be diffed against the original tool's output.
pub fn save_particles(path: impl AsRef<Path>, particles: &[Particle]) -> Result<(), SphError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    for p in particles {
        #[cfg(not(feature = "dim3"))]
        write!(writer, "{} {}", p.pos.x, p.pos.y)?;
        #[cfg(feature = "dim3")]
        write!(writer, "{} {} {}", p.pos.x, p.pos.y, p.pos.z)?;
        writeln!(writer, " {}", p.kind.to_code())?;
    }
    Ok(())
}
