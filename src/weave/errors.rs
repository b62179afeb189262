use crate::metadata::DescriptorError;

/// Errors from augmenting a class
///
/// Augmentation is atomic per class: any error means no part of the
/// transformation output should be applied.
#[derive(Debug)]
pub enum Error {
    /// The class descriptor was structurally unusable
    Descriptor(DescriptorError),
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Error {
        Error::Descriptor(err)
    }
}
