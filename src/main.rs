fn main() {
    classsphere_lib::run()
}
