//! Vector fields, their dimensionality, and the derived-field bundle.

use std::fmt;

use ndarray::ArrayD;

use crate::error::CoreError;
use crate::shape::{shape_of, Shape};

/// Output variable names, in write order.
pub const DERIVED_NAMES: [&str; 4] = ["Div", "Curl_x", "Curl_y", "Curl_z"];

/// One Cartesian component of a vector field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Component {
    /// x-like component (varies along the last axis).
    X,
    /// y-like component.
    Y,
    /// z-like component (varies along axis 0 of a volumetric grid).
    Z,
}

impl Component {
    /// Conventional stream variable name (`ux`, `uy`, `uz`).
    pub fn default_name(self) -> &'static str {
        match self {
            Self::X => "ux",
            Self::Y => "uy",
            Self::Z => "uz",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

/// How the differential operators interpret a field's axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimensionality {
    /// Derivatives along the last two axes only; any leading axis is
    /// carried through untouched. Only `Curl_z` is physically meaningful.
    Planar,
    /// Full 3D operators over axes (z, y, x) = (0, 1, 2).
    Volumetric,
}

impl Dimensionality {
    /// Classify a field from its global shape and component count.
    ///
    /// A 3-axis shape whose leading extent is 1 collapses to planar, as
    /// does any field without a z component. Shapes with fewer than 2 or
    /// more than 3 axes are rejected.
    pub fn classify(variable: &str, shape: &[usize], has_z: bool) -> Result<Self, CoreError> {
        match shape.len() {
            2 => Ok(Self::Planar),
            3 if shape[0] == 1 || !has_z => Ok(Self::Planar),
            3 => Ok(Self::Volumetric),
            _ => Err(CoreError::UnsupportedDimensionality {
                variable: variable.to_string(),
                shape: shape.iter().copied().collect(),
            }),
        }
    }

    /// Whether the z component must be read for this dimensionality.
    pub fn needs_z(self) -> bool {
        matches!(self, Self::Volumetric)
    }
}

/// Two or three co-located scalar grids sharing a shape.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorField {
    /// x-like component.
    pub ux: ArrayD<f64>,
    /// y-like component.
    pub uy: ArrayD<f64>,
    /// z-like component, absent for planar inputs.
    pub uz: Option<ArrayD<f64>>,
}

impl VectorField {
    /// A two-component field.
    pub fn planar(ux: ArrayD<f64>, uy: ArrayD<f64>) -> Self {
        Self { ux, uy, uz: None }
    }

    /// A three-component field.
    pub fn volumetric(ux: ArrayD<f64>, uy: ArrayD<f64>, uz: ArrayD<f64>) -> Self {
        Self {
            ux,
            uy,
            uz: Some(uz),
        }
    }

    /// Shape of the `ux` component.
    pub fn shape(&self) -> Shape {
        shape_of(&self.ux)
    }

    /// Check that all components agree in shape and classify the field.
    pub fn validate(&self) -> Result<Dimensionality, CoreError> {
        let expected = self.shape();
        let others = [(Component::Y, Some(&self.uy)), (Component::Z, self.uz.as_ref())];
        for (component, array) in others {
            if let Some(array) = array {
                let found = shape_of(array);
                if found != expected {
                    return Err(CoreError::ShapeMismatch {
                        variable: component.default_name().to_string(),
                        expected,
                        found,
                    });
                }
            }
        }
        Dimensionality::classify(Component::X.default_name(), &expected, self.uz.is_some())
    }
}

/// The four derived fields produced for each step.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedFields {
    /// Divergence.
    pub div: ArrayD<f64>,
    /// x component of the curl.
    pub curl_x: ArrayD<f64>,
    /// y component of the curl.
    pub curl_y: ArrayD<f64>,
    /// z component of the curl.
    pub curl_z: ArrayD<f64>,
}

impl DerivedFields {
    /// Shape shared by all four fields.
    pub fn shape(&self) -> Shape {
        shape_of(&self.div)
    }

    /// Iterate `(name, array)` pairs in [`DERIVED_NAMES`] order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ArrayD<f64>)> {
        DERIVED_NAMES
            .into_iter()
            .zip([&self.div, &self.curl_x, &self.curl_y, &self.curl_z])
    }

    /// Apply a fallible transformation to every field.
    pub fn try_map<E>(
        self,
        mut f: impl FnMut(&'static str, ArrayD<f64>) -> Result<ArrayD<f64>, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            div: f(DERIVED_NAMES[0], self.div)?,
            curl_x: f(DERIVED_NAMES[1], self.curl_x)?,
            curl_y: f(DERIVED_NAMES[2], self.curl_y)?,
            curl_z: f(DERIVED_NAMES[3], self.curl_z)?,
        })
    }
}
