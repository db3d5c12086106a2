mod article_detail;
mod country_list;
mod feed;
mod saved_list;

pub use article_detail::ArticleDetailView;
pub use country_list::CountryListView;
pub use feed::FeedView;
pub use saved_list::SavedListView;
