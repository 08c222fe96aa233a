// Directory entities: what gets imported, edited and looked up

pub mod company;
pub mod pcl;
pub mod region;

pub use company::{Company, CompanyCandidate, CompanyDataset, CompanyFilter, EditOutcome, MapMarker};
pub use pcl::{Pcl, PclCandidate, PclDataset};
pub use region::{District, SeedSummary, Village};
