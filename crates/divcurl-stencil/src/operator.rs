//! Divergence and curl of a vector field window.
//!
//! Constructed via the builder pattern: [`DifferentialOperator::builder`].

use divcurl_core::{CoreError, DerivedFields, Dimensionality, VectorField};
use ndarray::{ArrayD, ArrayViewD};

use crate::kernel::gradient;
use crate::order::{GridSpacing, StencilOrder};

/// Computes `{Div, Curl_x, Curl_y, Curl_z}` over a vector field.
///
/// # Volumetric fields
///
/// Axis 0 is z, axis 1 is y, axis 2 is x:
///
/// ```text
/// Div    = ∂ux/∂x + ∂uy/∂y + ∂uz/∂z
/// Curl_x = ∂uz/∂y - ∂uy/∂z
/// Curl_y = ∂ux/∂z - ∂uz/∂x
/// Curl_z = ∂uy/∂x - ∂ux/∂y
/// ```
///
/// # Planar fields
///
/// x is the last axis and y the one before it; a leading axis is carried
/// through. `Curl_x` and `Curl_y` are zero and any `uz` is ignored:
///
/// ```text
/// Div    = ∂ux/∂x + ∂uy/∂y
/// Curl_z = ∂uy/∂x - ∂ux/∂y
/// ```
///
/// # Construction
///
/// ```
/// use divcurl_stencil::{DifferentialOperator, StencilOrder};
///
/// let op = DifferentialOperator::builder()
///     .order(StencilOrder::Fourth)
///     .build()
///     .unwrap();
/// assert_eq!(op.order().halo(), 2);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifferentialOperator {
    order: StencilOrder,
    spacing: GridSpacing,
}

/// Builder for [`DifferentialOperator`].
///
/// Every field is optional: second order, unit spacing.
pub struct DifferentialOperatorBuilder {
    order: StencilOrder,
    spacing: GridSpacing,
}

impl DifferentialOperator {
    /// Create a new builder.
    pub fn builder() -> DifferentialOperatorBuilder {
        DifferentialOperatorBuilder {
            order: StencilOrder::default(),
            spacing: GridSpacing::default(),
        }
    }

    /// Configured accuracy order.
    pub fn order(&self) -> StencilOrder {
        self.order
    }

    /// Configured grid spacing.
    pub fn spacing(&self) -> GridSpacing {
        self.spacing
    }

    /// Compute the derived fields over `field`.
    ///
    /// # Errors
    ///
    /// [`CoreError::ShapeMismatch`] if the components disagree in shape,
    /// [`CoreError::UnsupportedDimensionality`] for fewer than 2 or more
    /// than 3 axes.
    pub fn apply(&self, field: &VectorField) -> Result<DerivedFields, CoreError> {
        match field.validate()? {
            Dimensionality::Planar => Ok(self.planar(field)),
            Dimensionality::Volumetric => {
                let uz = field.uz.as_ref().ok_or_else(|| CoreError::VariableNotFound {
                    name: "uz".to_string(),
                })?;
                Ok(self.volumetric(field, uz))
            }
        }
    }

    fn d(&self, a: &ArrayD<f64>, axis: usize, h: f64) -> ArrayD<f64> {
        let view: ArrayViewD<'_, f64> = a.view();
        gradient(&view, axis, h, self.order)
    }

    fn planar(&self, field: &VectorField) -> DerivedFields {
        let x = field.ux.ndim() - 1;
        let y = x - 1;
        let GridSpacing { dx, dy, .. } = self.spacing;

        let dux_dy = self.d(&field.ux, y, dy);
        let duy_dx = self.d(&field.uy, x, dx);
        let div = self.d(&field.ux, x, dx) + self.d(&field.uy, y, dy);
        let curl_z = duy_dx - dux_dy;
        let zeros = ArrayD::zeros(field.ux.raw_dim());

        DerivedFields {
            div,
            curl_x: zeros.clone(),
            curl_y: zeros,
            curl_z,
        }
    }

    fn volumetric(&self, field: &VectorField, uz: &ArrayD<f64>) -> DerivedFields {
        let (z, y, x) = (0, 1, 2);
        let GridSpacing { dx, dy, dz } = self.spacing;
        let (ux, uy) = (&field.ux, &field.uy);

        let div = self.d(ux, x, dx) + self.d(uy, y, dy) + self.d(uz, z, dz);
        let curl_x = self.d(uz, y, dy) - self.d(uy, z, dz);
        let curl_y = self.d(ux, z, dz) - self.d(uz, x, dx);
        let curl_z = self.d(uy, x, dx) - self.d(ux, y, dy);

        DerivedFields {
            div,
            curl_x,
            curl_y,
            curl_z,
        }
    }
}

impl DifferentialOperatorBuilder {
    /// Set the stencil accuracy order.
    pub fn order(mut self, order: StencilOrder) -> Self {
        self.order = order;
        self
    }

    /// Set the grid spacing.
    pub fn spacing(mut self, spacing: GridSpacing) -> Self {
        self.spacing = spacing;
        self
    }

    /// Build the operator.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any spacing is not finite and positive.
    pub fn build(self) -> Result<DifferentialOperator, String> {
        self.spacing.validate()?;
        Ok(DifferentialOperator {
            order: self.order,
            spacing: self.spacing,
        })
    }
}
