mod layout;
mod wrapper;
