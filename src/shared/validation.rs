use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Category slugs: lowercase alphanumeric words joined by single hyphens
    /// - Valid: "meme", "cursed-images", "anime2"
    /// - Invalid: "-meme", "meme-", "meme--x", "Meme", "meme_x"
    pub static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();

    /// Usernames must start with a letter or underscore and contain only alphanumerics and underscores
    /// - Valid: "john_doe", "user123", "_admin", "JohnDoe"
    /// - Invalid: "123user", "-user", "user-name", "user name"
    pub static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap();
}
