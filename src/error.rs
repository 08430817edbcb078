use std::io;

use quick_error::quick_error;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        Io(err: io::Error) {
            from()
            display("i/o error: {}", err)
        }
        BinaryTooLarge(size: usize) {
            display("binary of {} bytes does not fit in a 64k code segment", size)
        }
    }
}
