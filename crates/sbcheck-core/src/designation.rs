//! Helpers for small-body designations ("101P", "2014 AA", "C/2017 K2").

/// Natural ordering key for a designation.
///
/// The maximal leading run of ASCII digits is parsed as an integer (0 when
/// absent) and paired with the remaining text, so `"9P"` sorts before
/// `"101P"` where plain string comparison would not.
pub fn sort_key(designation: &str) -> (u64, &str) {
  let split = designation
    .find(|c: char| !c.is_ascii_digit())
    .unwrap_or(designation.len());
  let (digits, rest) = designation.split_at(split);
  let number = if digits.is_empty() {
    0
  } else {
    digits.parse().unwrap_or(u64::MAX)
  };
  (number, rest)
}

/// Sort designations in place by [`sort_key`].
pub fn sort_designations<T: AsRef<str>>(designations: &mut [T]) {
  designations.sort_by(|a, b| sort_key(a.as_ref()).cmp(&sort_key(b.as_ref())));
}

/// File-system friendly stem: lower case, no slashes or spaces.
pub fn designation_file_stem(designation: &str) -> String {
  designation
    .chars()
    .filter(|c| *c != '/' && *c != ' ')
    .flat_map(char::to_lowercase)
    .collect()
}
