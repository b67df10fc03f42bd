pub mod spatial_vector;
pub mod transform;

pub use spatial_vector::{ad, angular, dad, linear, spatial_vector, Jacobian, SpatialVector};
pub use transform::{
    ad_inv_r_linear, ad_inv_t, ad_inv_t_jac, ad_t, ad_t_jac, d_ad_inv_t, d_ad_t, exp_angular,
    log_map, transform_inertia, verify_transform,
};
