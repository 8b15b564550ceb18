fn main() {
    dark_fluid::app::run();
}
