//! Derived CTD quantities: practical salinity, in-situ density, and depth.
//!
//! The converter depends on an abstract [`Physics`] backend so the numerical
//! library can be swapped without touching segmentation or writer logic.
//! The default backend, [`UnescoPhysics`], implements the UNESCO 1983
//! algorithms: PSS-78 practical salinity from the conductivity ratio, the
//! EOS-80 equation of state for in-situ density, and the Fofonoff & Millard
//! pressure-to-depth conversion with latitude-dependent gravity.
//!
//! Every elementwise function propagates NaN: a NaN in any input at a row
//! produces NaN at that row and never an error. NaN is a valid datum here.

use crate::error::{AppResult, GliderError};
use crate::frame::{all_nan, nanmean, SensorFrame};

/// Conductivity of standard seawater (35 psu, 15 C, 0 dbar) in mS/cm.
const C35150: f64 = 42.914;

/// Narrow seam over the oceanographic formula library.
pub trait Physics {
    /// Practical salinity (PSS-78, dimensionless) from conductivity (S/m),
    /// temperature (C, ITS-90) and pressure (dbar).
    fn practical_salinity(&self, conductivity: f64, temperature: f64, pressure: f64) -> f64;

    /// In-situ density (kg/m^3) from practical salinity, temperature (C),
    /// pressure (dbar) and position (decimal degrees).
    fn density(
        &self,
        salinity: f64,
        temperature: f64,
        pressure: f64,
        latitude: f64,
        longitude: f64,
    ) -> f64;

    /// Positive depth (m) from pressure (dbar) and latitude (decimal
    /// degrees).
    fn depth_from_pressure(&self, pressure: f64, latitude: f64) -> f64;
}

/// UNESCO 1983 (EOS-80 / PSS-78) formula backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnescoPhysics;

impl Physics for UnescoPhysics {
    fn practical_salinity(&self, conductivity: f64, temperature: f64, pressure: f64) -> f64 {
        // Glider conductivity arrives in S/m; PSS-78 works on the ratio to
        // standard seawater in mS/cm.
        let ratio = conductivity * 10.0 / C35150;
        practical_salinity_from_ratio(ratio, temperature, pressure)
    }

    fn density(
        &self,
        salinity: f64,
        temperature: f64,
        pressure: f64,
        _latitude: f64,
        _longitude: f64,
    ) -> f64 {
        // EOS-80 does not use position; the parameters stay in the seam so
        // a TEOS-10 backend (absolute salinity needs them) can slot in.
        density_eos80(salinity, temperature, pressure)
    }

    fn depth_from_pressure(&self, pressure: f64, latitude: f64) -> f64 {
        depth_unesco(pressure, latitude)
    }
}

/// PSS-78 practical salinity from the conductivity ratio R = C/C(35,15,0).
fn practical_salinity_from_ratio(ratio: f64, temperature: f64, pressure: f64) -> f64 {
    if !ratio.is_finite() || !temperature.is_finite() || !pressure.is_finite() {
        return f64::NAN;
    }
    if ratio <= 0.0 {
        return f64::NAN;
    }

    // PSS-78 is defined on the IPTS-68 temperature scale.
    let t = temperature * 1.00024;

    const A: [f64; 6] = [0.0080, -0.1692, 25.3851, 14.0941, -7.0261, 2.7081];
    const B: [f64; 6] = [0.0005, -0.0056, -0.0066, -0.0375, 0.0636, -0.0144];
    const C: [f64; 5] = [0.676_609_7, 2.005_64e-2, 1.104_259e-4, -6.9698e-7, 1.0031e-9];
    const D1: f64 = 3.426e-2;
    const D2: f64 = 4.464e-4;
    const D3: f64 = 4.215e-1;
    const D4: f64 = -3.107e-3;
    const E1: f64 = 2.070e-5;
    const E2: f64 = -6.370e-10;
    const E3: f64 = 3.989e-15;
    const K: f64 = 0.0162;

    // rt: conductivity ratio of standard seawater at temperature t.
    let rt = C[0] + t * (C[1] + t * (C[2] + t * (C[3] + t * C[4])));
    // Rp: pressure correction.
    let rp = 1.0
        + (pressure * (E1 + pressure * (E2 + pressure * E3)))
            / (1.0 + D1 * t + D2 * t * t + (D3 + D4 * t) * ratio);
    let rt_ratio = ratio / (rp * rt);
    if rt_ratio < 0.0 {
        return f64::NAN;
    }

    let sqrt_rt = rt_ratio.sqrt();
    let mut sal = 0.0;
    let mut dsal = 0.0;
    let mut term = 1.0;
    for i in 0..6 {
        sal += A[i] * term;
        dsal += B[i] * term;
        term *= sqrt_rt;
    }
    sal + dsal * (t - 15.0) / (1.0 + K * (t - 15.0))
}

/// EOS-80 in-situ density (kg/m^3) at salinity (psu), temperature (C,
/// IPTS-68 after conversion) and pressure (dbar).
fn density_eos80(salinity: f64, temperature: f64, pressure: f64) -> f64 {
    if !salinity.is_finite() || !temperature.is_finite() || !pressure.is_finite() {
        return f64::NAN;
    }

    let t = temperature * 1.00024;
    let s = salinity;
    let sr = if s >= 0.0 { s.sqrt() } else { f64::NAN };
    // The secant bulk modulus polynomial takes pressure in bar.
    let p = pressure / 10.0;

    // Density of the standard mean ocean water reference.
    let rho_w = 999.842_594
        + t * (6.793_952e-2
            + t * (-9.095_290e-3 + t * (1.001_685e-4 + t * (-1.120_083e-6 + t * 6.536_332e-9))));

    // One-atmosphere density.
    let b = 8.244_93e-1 + t * (-4.0899e-3 + t * (7.6438e-5 + t * (-8.2467e-7 + t * 5.3875e-9)));
    let c = -5.724_66e-3 + t * (1.0227e-4 + t * -1.6546e-6);
    let d = 4.8314e-4;
    let rho_0 = rho_w + s * (b + sr * c) + s * s * d;

    if p == 0.0 {
        return rho_0;
    }

    // Secant bulk modulus K(S, t, p).
    let kw = 19652.21
        + t * (148.4206 + t * (-2.327_105 + t * (1.360_477e-2 + t * -5.155_288e-5)));
    let f = 54.6746 + t * (-0.603_459 + t * (1.099_87e-2 + t * -6.1670e-5));
    let g = 7.944e-2 + sr * (1.6483e-2 + sr * -5.3009e-4);
    let k0 = kw + s * f + s * sr * g;

    let aw = 3.239_908 + t * (1.437_13e-3 + t * (1.160_92e-4 + t * -5.779_05e-7));
    let a_coeff = aw
        + s * (2.2838e-3 + t * (-1.0981e-5 + t * -1.6078e-6))
        + s * sr * 1.910_75e-4;

    let bw = 8.509_35e-5 + t * (-6.122_93e-6 + t * 5.2787e-8);
    let b_coeff = bw + s * (-9.9348e-7 + t * (2.0816e-8 + t * 9.1697e-10));

    let k = k0 + p * (a_coeff + p * b_coeff);

    rho_0 / (1.0 - p / k)
}

/// UNESCO pressure-to-depth conversion; returns positive depth in meters.
fn depth_unesco(pressure: f64, latitude: f64) -> f64 {
    if !pressure.is_finite() || !latitude.is_finite() {
        return f64::NAN;
    }
    let x = latitude.to_radians().sin().powi(2);
    let gravity =
        9.780_318 * (1.0 + (5.2788e-3 + 2.36e-5 * x) * x) + 1.092e-6 * pressure;
    let depth = (((-1.82e-15 * pressure + 2.279e-10) * pressure - 2.2512e-5) * pressure
        + 9.726_59)
        * pressure
        / gravity;
    depth.abs()
}

/// Elementwise practical salinity over whole columns.
pub fn calculate_practical_salinity(
    physics: &dyn Physics,
    conductivity: &[f64],
    temperature: &[f64],
    pressure: &[f64],
) -> Vec<f64> {
    conductivity
        .iter()
        .zip(temperature)
        .zip(pressure)
        .map(|((c, t), p)| physics.practical_salinity(*c, *t, *p))
        .collect()
}

/// Elementwise in-situ density over whole columns, at a representative
/// single position for the profile.
pub fn calculate_density(
    physics: &dyn Physics,
    salinity: &[f64],
    temperature: &[f64],
    pressure: &[f64],
    latitude: f64,
    longitude: f64,
) -> Vec<f64> {
    salinity
        .iter()
        .zip(temperature)
        .zip(pressure)
        .map(|((s, t), p)| physics.density(*s, *t, *p, latitude, longitude))
        .collect()
}

/// Elementwise depth from pressure at a representative single latitude.
pub fn calculate_depth(physics: &dyn Physics, pressure: &[f64], latitude: f64) -> Vec<f64> {
    pressure
        .iter()
        .map(|p| physics.depth_from_pressure(*p, latitude))
        .collect()
}

/// The derived columns produced for one source frame.
pub struct DerivedVariables {
    pub salinity: Vec<f64>,
    pub density: Vec<f64>,
    pub depth: Vec<f64>,
    pub mean_latitude: f64,
    pub mean_longitude: f64,
}

/// Run the full derived-variable pipeline over a CTD sub-frame.
///
/// `ctd` must be the frame produced by selecting the llat sensors plus the
/// conductivity/temperature pair, in that order (time, pressure, latitude,
/// longitude, depth, conductivity, temperature). Fails with
/// [`GliderError::InsufficientPosition`] when no valid latitude or longitude
/// exists anywhere in the frame, since the physical formulas need position.
pub fn derive_variables(physics: &dyn Physics, ctd: &SensorFrame) -> AppResult<DerivedVariables> {
    let pressure = column(ctd, 1);
    let latitude = column(ctd, 2);
    let longitude = column(ctd, 3);
    let conductivity = column(ctd, 5);
    let temperature = column(ctd, 6);

    if all_nan(&latitude) {
        return Err(GliderError::InsufficientPosition("latitude"));
    }
    if all_nan(&longitude) {
        return Err(GliderError::InsufficientPosition("longitude"));
    }
    let mean_latitude = nanmean(&latitude);
    let mean_longitude = nanmean(&longitude);

    let salinity =
        calculate_practical_salinity(physics, &conductivity, &temperature, &pressure);
    let density = calculate_density(
        physics,
        &salinity,
        &temperature,
        &pressure,
        mean_latitude,
        mean_longitude,
    );
    let depth = calculate_depth(physics, &pressure, mean_latitude);

    Ok(DerivedVariables {
        salinity,
        density,
        depth,
        mean_latitude,
        mean_longitude,
    })
}

fn column(frame: &SensorFrame, index: usize) -> Vec<f64> {
    let indices: Vec<usize> = (0..frame.num_rows()).collect();
    frame.column_slice(index, &indices)
}
