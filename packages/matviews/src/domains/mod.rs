pub mod matviews;
