pub mod player;
pub mod track;
