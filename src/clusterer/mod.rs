mod centroid;
mod density;
mod similarity;
mod types;

#[cfg(test)]
mod tests;

pub use centroid::{cluster_centroids, compute_centroid};
pub use density::DensityClusterer;
pub use similarity::{cosine_distance, cosine_similarity, similarity_matrix};
pub use types::Clustering;
