#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid color `{0}`: expected #RRGGBB or #RRGGBBAA")]
    InvalidColor(String),
}

pub type Result<T> = std::result::Result<T, Error>;
