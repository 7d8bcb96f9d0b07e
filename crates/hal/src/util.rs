/// Sum of two words with 32-bit wrap-around.
pub fn add_numbers(a: u32, b: u32) -> u32 {
    a.wrapping_add(b)
}

/// Operating range of the board, in degrees Celsius: -40 to 85 inclusive.
pub fn is_valid_temperature(celsius: i16) -> bool {
    (-40..=85).contains(&celsius)
}
