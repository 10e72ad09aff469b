//! DDC (digital drive compensation) headphone correction
//!
//! A DDC file holds one biquad cascade per reference rate:
//!
//! ```text
//! # comment
//! SR_44100:1.0012,-1.9784,0.9775,1.9784,-0.9787,...
//! SR_48000:1.0011,-1.9802,0.9793,1.9802,-0.9804,...
//! ```
//!
//! Each section is five numbers `b0,b1,b2,a1,a2` with the feedback terms
//! stored added (`y = b0*x + b1*x1 + b2*x2 + a1*y1 + a2*y2`). Coefficients
//! may continue on following lines until the next `SR_` header.

use super::biquad::{process_cascade, Biquad, Coefficients};
use super::effect::AudioEffect;
use crate::error::{AudioError, Result};

const SECTION_LEN: usize = 5;

/// Parsed DDC file
///
/// Filter state for every set is built with the design, so switching sets
/// on a rate change never allocates.
#[derive(Debug, Clone)]
pub struct DdcDesign {
    /// Cascades keyed by their reference rate, ascending
    sets: Vec<(u32, Vec<Coefficients>)>,
    cascades: Vec<Vec<Biquad>>,
}

impl DdcDesign {
    /// Parse DDC text
    ///
    /// # Errors
    /// `DdcParse` for a missing header, a non-numeric coefficient, a
    /// coefficient count that is not a multiple of five, or a file
    /// without any set.
    pub fn parse(text: &str) -> Result<Self> {
        let mut sets: Vec<(u32, Vec<f64>)> = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line_no = index + 1;

            let body = if let Some(rest) = line.strip_prefix("SR_") {
                let (rate, body) = rest.split_once(':').ok_or_else(|| {
                    AudioError::DdcParse(format!("line {line_no}: header without ':'"))
                })?;
                let rate = rate.trim().parse::<u32>().map_err(|_| {
                    AudioError::DdcParse(format!("line {line_no}: bad rate '{rate}'"))
                })?;
                sets.push((rate, Vec::new()));
                body
            } else {
                line
            };

            let Some((_, values)) = sets.last_mut() else {
                return Err(AudioError::DdcParse(format!(
                    "line {line_no}: coefficients before any SR_ header"
                )));
            };
            for token in body.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                let value = token.parse::<f64>().map_err(|_| {
                    AudioError::DdcParse(format!("line {line_no}: bad coefficient '{token}'"))
                })?;
                values.push(value);
            }
        }

        if sets.is_empty() {
            return Err(AudioError::DdcParse("no coefficient sets".to_string()));
        }

        let mut parsed = Vec::with_capacity(sets.len());
        for (rate, values) in sets {
            if values.is_empty() || values.len() % SECTION_LEN != 0 {
                return Err(AudioError::DdcParse(format!(
                    "SR_{rate}: {} coefficients is not a whole number of sections",
                    values.len()
                )));
            }
            let sections: Vec<Coefficients> = values
                .chunks_exact(SECTION_LEN)
                .map(|c| Coefficients {
                    b0: c[0],
                    b1: c[1],
                    b2: c[2],
                    a1: -c[3],
                    a2: -c[4],
                })
                .collect();
            parsed.push((rate, sections));
        }
        parsed.sort_by_key(|(rate, _)| *rate);

        let cascades = parsed
            .iter()
            .map(|(_, sections)| sections.iter().copied().map(Biquad::new).collect())
            .collect();
        Ok(Self {
            sets: parsed,
            cascades,
        })
    }

    /// Reference rates present in the file
    pub fn rates(&self) -> Vec<u32> {
        self.sets.iter().map(|(rate, _)| *rate).collect()
    }

    /// Cascade for `sample_rate`
    ///
    /// Multiples of 11025 Hz use the 44100 set, everything else the 48000
    /// set; when the preferred family is absent the closest set is used.
    pub fn select(&self, sample_rate: f32) -> &[Coefficients] {
        self.select_index(sample_rate)
            .map_or(&[], |index| self.sets[index].1.as_slice())
    }

    fn select_index(&self, sample_rate: f32) -> Option<usize> {
        let family = if (sample_rate.round() as u32) % 11025 == 0 {
            44100
        } else {
            48000
        };
        self.sets
            .iter()
            .enumerate()
            .min_by_key(|(_, (rate, _))| rate.abs_diff(family))
            .map(|(index, _)| index)
    }
}

/// DDC effect
pub struct Ddc {
    design: Option<Box<DdcDesign>>,
    active: Option<usize>,
    sample_rate: f32,
    enabled: bool,
}

impl Ddc {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            design: None,
            active: None,
            sample_rate,
            enabled: false,
        }
    }

    /// Install a parsed file; `None` clears the cascade
    ///
    /// Returns the previous design.
    pub fn install(
        &mut self,
        enabled: bool,
        design: Option<Box<DdcDesign>>,
    ) -> Option<Box<DdcDesign>> {
        let previous = std::mem::replace(&mut self.design, design);
        self.select_set();
        self.enabled = enabled && self.design.is_some();
        previous
    }

    pub fn sections(&self) -> usize {
        match (&self.design, self.active) {
            (Some(design), Some(index)) => design.cascades[index].len(),
            _ => 0,
        }
    }

    fn select_set(&mut self) {
        let rate = self.sample_rate;
        self.active = self.design.as_mut().and_then(|design| {
            let index = design.select_index(rate)?;
            design.cascades[index].iter_mut().for_each(Biquad::reset);
            Some(index)
        });
    }
}

impl AudioEffect for Ddc {
    fn process(&mut self, buffer: &mut [f32]) {
        if !self.enabled {
            return;
        }
        if let (Some(design), Some(index)) = (self.design.as_mut(), self.active) {
            process_cascade(&mut design.cascades[index], buffer);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.select_set();
    }

    fn reset(&mut self) {
        if let (Some(design), Some(index)) = (self.design.as_mut(), self.active) {
            design.cascades[index].iter_mut().for_each(Biquad::reset);
        }
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "DDC"
    }
}
