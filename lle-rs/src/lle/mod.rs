pub mod build_cost_operator;
pub mod check_connectivity;
pub mod compute_weights;
pub mod extract_embedding;
pub mod find_neighbors;
pub mod solve_weights;
